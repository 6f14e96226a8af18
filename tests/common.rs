//! Common test utilities for zcash-monkey integration tests
//!
//! Provides a scripted in-memory node that records every RPC it receives and
//! a test environment wiring it into [`Actions`] with a temporary settings file.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use zcash_monkey::node::{
    AddressValidation, BlockchainInfo, GroupedAddress, NodeConnector, NodeGateway,
    OperationParams, OperationResult, OperationStatus, SendAmount, TotalBalances,
};
use zcash_monkey::{Actions, ClientConfig, NodeError, Settings};

// m/0/0 .. m/0/2 below XPUB on mainnet
pub const XPUB: &str = "xpub6DKCpzYonPtjhfL9Gc6cJRxqtX3pvw3ACLguiZByfS1vic1EqgHPRBu7inUvoNxBT1m6BNuU5uUSSo5X3Zzi5mbrByBBQwhvNmmi8HErHt6";
pub const FIRST_ADDRESS: &str = "t1MZtRMbCE6uJTbVot6XczUKNvG5iRgcf8d";

pub const OPERATION_ID: &str = "opid-6e581ee5-4e90-4e70-8961-f95d8d28748c";

pub fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

/// One RPC as seen by [`MockNode`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BlockchainInfo,
    AddressGroupings,
    Validate(String),
    ListShielded,
    ShieldedBalance(String),
    TotalBalances,
    Import {
        address: String,
        label: String,
        rescan: bool,
    },
    SendMany {
        from: String,
        amounts: Vec<SendAmount>,
    },
    OperationStatus(Vec<String>),
}

/// Scripted node; every field can be adjusted before or during a test
#[derive(Default)]
pub struct MockNode {
    pub calls: Mutex<Vec<Call>>,
    pub chain: Mutex<String>,
    /// Error message returned by `getblockchaininfo` instead of an answer
    pub info_error: Mutex<Option<String>>,
    pub groupings: Mutex<Vec<Vec<GroupedAddress>>>,
    /// Unknown addresses validate as valid but not in the wallet
    pub validations: Mutex<HashMap<String, AddressValidation>>,
    pub shielded: Mutex<Vec<String>>,
    pub balances: Mutex<HashMap<String, f64>>,
    pub failing_imports: Mutex<HashSet<String>>,
    /// Statuses handed out one per `z_getoperationstatus`; the last one repeats
    pub operation_statuses: Mutex<VecDeque<String>>,
    /// Number of upcoming `z_getoperationstatus` calls that fail
    pub operation_failures: Mutex<usize>,
    /// `z_getoperationstatus` answers with an empty list
    pub operation_unknown: Mutex<bool>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        let node = Self::default();
        *node.chain.lock().unwrap() = "main".to_string();
        node.operation_statuses
            .lock()
            .unwrap()
            .push_back("executing".to_string());
        Arc::new(node)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn set_owned(&self, address: &str, balance: f64) {
        self.validations.lock().unwrap().insert(
            address.to_string(),
            AddressValidation {
                isvalid: true,
                ismine: true,
                iswatchonly: false,
                account: String::new(),
            },
        );
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), balance);
    }

    pub fn set_statuses(&self, statuses: &[&str]) {
        *self.operation_statuses.lock().unwrap() =
            statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn status_polls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::OperationStatus(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl NodeGateway for MockNode {
    async fn get_blockchain_info(&self) -> Result<BlockchainInfo, NodeError> {
        self.record(Call::BlockchainInfo);
        if let Some(message) = self.info_error.lock().unwrap().clone() {
            return Err(NodeError::Rpc { code: -28, message });
        }
        Ok(BlockchainInfo {
            chain: self.chain.lock().unwrap().clone(),
            blocks: 419_200,
            headers: 419_200,
            ..Default::default()
        })
    }

    async fn list_address_groupings(&self) -> Result<Vec<Vec<GroupedAddress>>, NodeError> {
        self.record(Call::AddressGroupings);
        Ok(self.groupings.lock().unwrap().clone())
    }

    async fn validate_address(&self, address: &str) -> Result<AddressValidation, NodeError> {
        self.record(Call::Validate(address.to_string()));
        Ok(self
            .validations
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or(AddressValidation {
                isvalid: true,
                ..Default::default()
            }))
    }

    async fn list_shielded_addresses(&self) -> Result<Vec<String>, NodeError> {
        self.record(Call::ListShielded);
        Ok(self.shielded.lock().unwrap().clone())
    }

    async fn get_shielded_balance(&self, address: &str) -> Result<f64, NodeError> {
        self.record(Call::ShieldedBalance(address.to_string()));
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_total_balances(&self) -> Result<TotalBalances, NodeError> {
        self.record(Call::TotalBalances);
        Ok(TotalBalances {
            transparent: "1.5".to_string(),
            private: "0.25".to_string(),
            total: "1.75".to_string(),
        })
    }

    async fn import_address(
        &self,
        address: &str,
        label: &str,
        rescan: bool,
    ) -> Result<(), NodeError> {
        self.record(Call::Import {
            address: address.to_string(),
            label: label.to_string(),
            rescan,
        });
        if self.failing_imports.lock().unwrap().contains(address) {
            return Err(NodeError::Rpc {
                code: -4,
                message: format!("Error adding address {}", address),
            });
        }
        self.validations.lock().unwrap().insert(
            address.to_string(),
            AddressValidation {
                isvalid: true,
                ismine: false,
                iswatchonly: true,
                account: label.to_string(),
            },
        );
        Ok(())
    }

    async fn send_many(&self, from: &str, amounts: Vec<SendAmount>) -> Result<String, NodeError> {
        self.record(Call::SendMany {
            from: from.to_string(),
            amounts,
        });
        Ok(OPERATION_ID.to_string())
    }

    async fn get_operation_status(
        &self,
        operation_ids: Vec<String>,
    ) -> Result<Vec<OperationStatus>, NodeError> {
        self.record(Call::OperationStatus(operation_ids.clone()));
        {
            let mut failures = self.operation_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(NodeError::Http {
                    status: 503,
                    body: "Loading block index...".to_string(),
                });
            }
        }
        if *self.operation_unknown.lock().unwrap() {
            return Ok(Vec::new());
        }

        let status = {
            let mut statuses = self.operation_statuses.lock().unwrap();
            if statuses.len() > 1 {
                statuses.pop_front().unwrap_or_default()
            } else {
                statuses.front().cloned().unwrap_or_default()
            }
        };
        let amounts = self
            .calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::SendMany { amounts, .. } => Some(amounts.clone()),
                _ => None,
            })
            .unwrap_or_default();

        Ok(operation_ids
            .into_iter()
            .map(|id| OperationStatus {
                id,
                result: (status == "success").then(|| OperationResult {
                    txid: "4b6fd6fc8a8a0a0b4f3bd3ab10b6f4a4fbd2cc7aa1c33d1bb4c7f1ef4d3c2a10"
                        .to_string(),
                }),
                status: status.clone(),
                creation_time: Some(1_540_000_000),
                params: Some(OperationParams {
                    fromaddress: "t1from".to_string(),
                    amounts: amounts.clone(),
                }),
                error: None,
            })
            .collect())
    }
}

/// Hands out the shared [`MockNode`]; refuses settings without a URL like the real connector
pub struct MockConnector {
    pub node: Arc<MockNode>,
}

impl NodeConnector for MockConnector {
    fn connect(&self, settings: &Settings) -> Result<Arc<dyn NodeGateway>, NodeError> {
        if settings.rpc_url.is_empty() {
            return Err(NodeError::MissingSetting("rpc_url"));
        }
        let node: Arc<dyn NodeGateway> = self.node.clone();
        Ok(node)
    }
}

/// Actions wired to a mock node with settings stored in a temp directory
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub node: Arc<MockNode>,
    pub actions: Actions,
}

impl TestEnvironment {
    pub fn new() -> Self {
        init_logging();
        let temp_dir = TempDir::new().unwrap();
        let node = MockNode::new();

        let config = ClientConfig {
            rpc_timeout: Duration::from_secs(10),
            throttle_window: Duration::from_millis(100),
            poll_interval: Duration::from_millis(2000),
            import_retry_pause: Duration::from_millis(2000),
            settle_pause: Duration::from_millis(100),
            settings_path: temp_dir.path().join("settings.json"),
        };
        let connector = Arc::new(MockConnector { node: node.clone() });
        let actions = Actions::new(config, connector);

        Self {
            temp_dir,
            node,
            actions,
        }
    }

    /// Environment with accepted settings and chain info already loaded
    pub async fn connected() -> Self {
        let env = Self::new();
        env.actions
            .set_settings(Settings {
                rpc_url: "http://127.0.0.1:8232".to_string(),
                rpc_user: "monkey".to_string(),
                rpc_password: "banana".to_string(),
                xpub: XPUB.to_string(),
            })
            .await;
        env.node.take_calls();
        env
    }
}
