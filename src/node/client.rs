use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::gateway::{NodeConnector, NodeGateway};
use super::types::*;
use crate::error::NodeError;
use crate::settings::Settings;

/// JSON-RPC client for a zcashd node
pub struct RpcNode {
    client: Client,
    url: String,
    username: String,
    password: String,
    request_id: AtomicU64,
}

impl RpcNode {
    pub fn new(settings: &Settings, timeout: Duration) -> Result<Self, NodeError> {
        if settings.rpc_url.is_empty() {
            return Err(NodeError::MissingSetting("rpc_url"));
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: settings.rpc_url.clone(),
            username: settings.rpc_user.clone(),
            password: settings.rpc_password.clone(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a JSON-RPC method
    ///
    /// zcashd answers RPC-level failures with HTTP 500 and an `error` object in
    /// the body, so the body is inspected before the status code.
    async fn call<P: Serialize + Send, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, NodeError> {
        let request = JsonRpcRequest::new(method, params, self.next_id());
        log::debug!("rpc -> {}", method);

        let mut builder = self.client.post(&self.url).json(&request);
        if !self.username.is_empty() {
            builder = builder.basic_auth(&self.username, Some(&self.password));
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed = serde_json::from_str::<JsonRpcResponse>(&body);
        if let Ok(JsonRpcResponse {
            error: Some(error), ..
        }) = &parsed
        {
            log::debug!("rpc <- {} error {}: {}", method, error.code, error.message);
            return Err(NodeError::Rpc {
                code: error.code,
                message: error.message.clone(),
            });
        }
        if !status.is_success() {
            return Err(NodeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let malformed = |detail: String| NodeError::MalformedResponse {
            method: method.to_string(),
            detail,
        };
        let rpc = parsed.map_err(|e| malformed(e.to_string()))?;
        serde_json::from_value(rpc.result).map_err(|e| malformed(e.to_string()))
    }
}

#[async_trait]
impl NodeGateway for RpcNode {
    async fn get_blockchain_info(&self) -> Result<BlockchainInfo, NodeError> {
        self.call("getblockchaininfo", json!([])).await
    }

    async fn list_address_groupings(&self) -> Result<Vec<Vec<GroupedAddress>>, NodeError> {
        let raw: Vec<Vec<Vec<Value>>> = self.call("listaddressgroupings", json!([])).await?;
        raw.into_iter()
            .map(|group| group.into_iter().map(parse_grouped_address).collect())
            .collect()
    }

    async fn validate_address(&self, address: &str) -> Result<AddressValidation, NodeError> {
        self.call("validateaddress", json!([address])).await
    }

    async fn list_shielded_addresses(&self) -> Result<Vec<String>, NodeError> {
        self.call("z_listaddresses", json!([])).await
    }

    async fn get_shielded_balance(&self, address: &str) -> Result<f64, NodeError> {
        self.call("z_getbalance", json!([address])).await
    }

    async fn get_total_balances(&self) -> Result<TotalBalances, NodeError> {
        self.call("z_gettotalbalance", json!([])).await
    }

    async fn import_address(
        &self,
        address: &str,
        label: &str,
        rescan: bool,
    ) -> Result<(), NodeError> {
        let _: Value = self
            .call("importaddress", json!([address, label, rescan]))
            .await?;
        Ok(())
    }

    async fn send_many(&self, from: &str, amounts: Vec<SendAmount>) -> Result<String, NodeError> {
        self.call("z_sendmany", json!([from, amounts])).await
    }

    async fn get_operation_status(
        &self,
        operation_ids: Vec<String>,
    ) -> Result<Vec<OperationStatus>, NodeError> {
        self.call("z_getoperationstatus", json!([operation_ids])).await
    }
}

/// Decode one `[address, balance, account?]` tuple
fn parse_grouped_address(entry: Vec<Value>) -> Result<GroupedAddress, NodeError> {
    let malformed = |detail: &str| NodeError::MalformedResponse {
        method: "listaddressgroupings".to_string(),
        detail: detail.to_string(),
    };
    let address = entry
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing address"))?
        .to_string();
    let balance = entry
        .get(1)
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed("missing balance"))?;
    let account = entry
        .get(2)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(GroupedAddress {
        address,
        balance,
        account,
    })
}

/// Connects [`RpcNode`]s using the configured timeout
pub struct RpcConnector {
    timeout: Duration,
}

impl RpcConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl NodeConnector for RpcConnector {
    fn connect(&self, settings: &Settings) -> Result<Arc<dyn NodeGateway>, NodeError> {
        let node: Arc<dyn NodeGateway> = Arc::new(RpcNode::new(settings, self.timeout)?);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grouped_address() {
        let with_account = parse_grouped_address(vec![
            json!("tmDQdkC5bcmQobqhFYpqMr8z8XFAXragbZ6"),
            json!(1.5),
            json!("savings"),
        ])
        .unwrap();
        assert_eq!(with_account.balance, 1.5);
        assert_eq!(with_account.account, "savings");

        let without_account = parse_grouped_address(vec![json!("t1abc"), json!(0)]).unwrap();
        assert_eq!(without_account.account, "");

        assert!(parse_grouped_address(vec![json!("t1abc")]).is_err());
    }

    #[test]
    fn test_missing_rpc_url() {
        let err = RpcNode::new(&Settings::default(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, NodeError::MissingSetting("rpc_url")));
    }

    #[test]
    fn test_send_amount_omits_empty_memo() {
        let amount = SendAmount {
            address: "zs1abc".to_string(),
            amount: 0.1,
            memo: None,
        };
        let encoded = serde_json::to_value(&amount).unwrap();
        assert!(encoded.get("memo").is_none());
    }
}
