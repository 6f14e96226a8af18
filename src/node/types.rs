// zcashd RPC request/response types
// https://github.com/zcash/zcash/blob/master/doc/payment-api.md

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> JsonRpcRequest<'a, P> {
    pub fn new(method: &'a str, params: P, id: u64) -> Self {
        Self {
            jsonrpc: "1.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: serde_json::Value,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Subset of `getblockchaininfo` the client cares about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    pub bestblockhash: String,
    pub difficulty: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AddressValidation {
    pub isvalid: bool,
    pub ismine: bool,
    pub iswatchonly: bool,
    pub account: String,
}

impl AddressValidation {
    /// Known to the wallet, either spendable or watch-only
    pub fn in_wallet(&self) -> bool {
        self.ismine || self.iswatchonly
    }
}

/// `z_gettotalbalance` reports amounts as decimal strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalBalances {
    pub transparent: String,
    pub private: String,
    pub total: String,
}

impl Default for TotalBalances {
    fn default() -> Self {
        Self {
            transparent: "0".to_string(),
            private: "0".to_string(),
            total: "0".to_string(),
        }
    }
}

/// One `[address, balance, account?]` entry of `listaddressgroupings`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedAddress {
    pub address: String,
    pub balance: f64,
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendAmount {
    pub address: String,
    pub amount: f64,
    /// Hex-encoded memo, shielded recipients only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub creation_time: Option<i64>,
    #[serde(default)]
    pub result: Option<OperationResult>,
    #[serde(default)]
    pub params: Option<OperationParams>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationResult {
    pub txid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationParams {
    pub fromaddress: String,
    pub amounts: Vec<SendAmount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    pub code: i64,
    pub message: String,
}
