use async_trait::async_trait;
use std::sync::Arc;

use super::types::*;
use crate::error::NodeError;
use crate::settings::Settings;

/// Wallet-capable node RPC surface consumed by the orchestrator
///
/// Every call is a suspension point and may fail; callers issue them one at a
/// time because a node busy with a rescan serializes RPC handling anyway.
#[async_trait]
pub trait NodeGateway: Send + Sync {
    async fn get_blockchain_info(&self) -> Result<BlockchainInfo, NodeError>;

    async fn list_address_groupings(&self) -> Result<Vec<Vec<GroupedAddress>>, NodeError>;

    async fn validate_address(&self, address: &str) -> Result<AddressValidation, NodeError>;

    async fn list_shielded_addresses(&self) -> Result<Vec<String>, NodeError>;

    async fn get_shielded_balance(&self, address: &str) -> Result<f64, NodeError>;

    async fn get_total_balances(&self) -> Result<TotalBalances, NodeError>;

    async fn import_address(&self, address: &str, label: &str, rescan: bool)
        -> Result<(), NodeError>;

    /// Submit a payment, returning the async operation id
    async fn send_many(&self, from: &str, amounts: Vec<SendAmount>) -> Result<String, NodeError>;

    async fn get_operation_status(
        &self,
        operation_ids: Vec<String>,
    ) -> Result<Vec<OperationStatus>, NodeError>;
}

/// Builds a gateway for the settings currently in the store
pub trait NodeConnector: Send + Sync {
    fn connect(&self, settings: &Settings) -> Result<Arc<dyn NodeGateway>, NodeError>;
}
