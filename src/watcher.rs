//! Operation status polling
//!
//! After a send, the node reports progress through an async operation id.
//! [`OperationWatcher`] polls that id until it leaves the `executing` state,
//! merging every status it sees into the store. Only one operation is watched
//! at a time.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{ext_err, NodeError, Result};
use crate::node::{NodeGateway, OperationStatus};
use crate::store::{Emit, EntityStore, OperationPatch, StateField};

/// Node status of an operation that has not finished yet
pub const STATUS_EXECUTING: &str = "executing";

/// Shortest accepted poll interval; tokio intervals need a non-zero period
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct OperationWatcher {
    store: Arc<EntityStore>,
    poll_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OperationWatcher {
    pub fn new(store: Arc<EntityStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            task: Mutex::new(None),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start polling `operation_id` unless another operation is already watched
    ///
    /// Returns whether a poll task was started. The first poll happens one
    /// interval after the call.
    pub fn watch(&self, gateway: Arc<dyn NodeGateway>, operation_id: &str) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            log::warn!(
                "Already watching an operation, not watching {}",
                operation_id
            );
            return false;
        }

        self.store
            .set_scalar(StateField::IsWatchOperation(true), Emit::Immediate);
        log::info!("Watching operation {}", operation_id);

        *task = Some(tokio::spawn(poll_until_done(
            Arc::clone(&self.store),
            gateway,
            operation_id.to_string(),
            self.poll_interval,
        )));
        true
    }
}

async fn poll_until_done(
    store: Arc<EntityStore>,
    gateway: Arc<dyn NodeGateway>,
    operation_id: String,
    period: Duration,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let patch = match fetch_operation_update(gateway.as_ref(), &operation_id).await {
            Ok(patch) => patch,
            Err(e) => {
                log::warn!("Polling operation {} failed: {}", operation_id, ext_err(&e));
                continue;
            }
        };

        let done = patch.status.as_deref() != Some(STATUS_EXECUTING);
        log::debug!("Operation {} is {:?}", operation_id, patch.status);
        store.merge_entity(patch, Emit::Immediate);

        if done {
            store.set_scalar(StateField::IsWatchOperation(false), Emit::Immediate);
            log::info!("Stopped watching operation {}", operation_id);
            break;
        }
    }
}

/// Query the node for one operation and turn the answer into a patch
pub async fn fetch_operation_update(
    gateway: &dyn NodeGateway,
    operation_id: &str,
) -> Result<OperationPatch> {
    let statuses = gateway
        .get_operation_status(vec![operation_id.to_string()])
        .await?;
    let status = statuses
        .into_iter()
        .next()
        .ok_or_else(|| NodeError::MalformedResponse {
            method: "z_getoperationstatus".to_string(),
            detail: format!("no status for {}", operation_id),
        })?;

    Ok(operation_patch(
        operation_id,
        status,
        Utc::now().timestamp_millis(),
    ))
}

fn operation_patch(operation_id: &str, status: OperationStatus, checked: i64) -> OperationPatch {
    let mut patch = OperationPatch {
        id: operation_id.to_string(),
        status: Some(status.status),
        checked: Some(checked),
        txid: status.result.map(|r| r.txid),
        error: Some(status.error.map(|e| e.message).unwrap_or_default()),
        ..Default::default()
    };

    if let Some(params) = status.params {
        patch.from = Some(params.fromaddress);
        if let Some(first) = params.amounts.into_iter().next() {
            patch.to = Some(first.address);
            patch.amount = Some(first.amount);
            // Kept hex-encoded as the node reports it
            patch.memo = first.memo;
        }
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::encode_hex_memo;
    use crate::node::{OperationError, OperationParams, OperationResult, SendAmount};

    #[test]
    fn test_operation_patch_success() {
        let status = OperationStatus {
            id: "opid-1".to_string(),
            status: "success".to_string(),
            creation_time: Some(1_540_000_000),
            result: Some(OperationResult {
                txid: "ab12".to_string(),
            }),
            params: Some(OperationParams {
                fromaddress: "t1from".to_string(),
                amounts: vec![SendAmount {
                    address: "zs1to".to_string(),
                    amount: 0.25,
                    memo: Some(encode_hex_memo("thanks")),
                }],
            }),
            error: None,
        };

        let patch = operation_patch("opid-1", status, 42);
        assert_eq!(patch.status.as_deref(), Some("success"));
        assert_eq!(patch.txid.as_deref(), Some("ab12"));
        assert_eq!(patch.from.as_deref(), Some("t1from"));
        assert_eq!(patch.to.as_deref(), Some("zs1to"));
        assert_eq!(patch.amount, Some(0.25));
        assert_eq!(patch.memo, Some(encode_hex_memo("thanks")));
        assert_eq!(patch.checked, Some(42));
        assert_eq!(patch.error.as_deref(), Some(""));
    }

    #[test]
    fn test_operation_patch_failure_keeps_existing_fields() {
        let status = OperationStatus {
            id: "opid-2".to_string(),
            status: "failed".to_string(),
            creation_time: None,
            result: None,
            params: None,
            error: Some(OperationError {
                code: -6,
                message: "Insufficient funds".to_string(),
            }),
        };

        let patch = operation_patch("opid-2", status, 7);
        assert_eq!(patch.error.as_deref(), Some("Insufficient funds"));
        assert!(patch.txid.is_none());
        assert!(patch.from.is_none());
        assert!(patch.amount.is_none());
    }
}
