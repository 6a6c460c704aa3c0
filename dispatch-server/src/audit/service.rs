//! Audit log service
//!
//! `record` appends synchronously so a successful call means the event
//! is durable. On append failure the event is logged at `error!` and
//! handed to the retry channel; the caller is never affected either
//! way.

use std::sync::Arc;

use serde_json::Value;
use shared::{Actor, AppError, AppResult, LifecycleEvent};
use tokio::sync::mpsc;

use crate::lifecycle::LifecycleStorage;

pub struct AuditService {
    storage: LifecycleStorage,
    retry_tx: mpsc::Sender<LifecycleEvent>,
}

impl std::fmt::Debug for AuditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditService").finish_non_exhaustive()
    }
}

impl AuditService {
    /// Create the service plus the receiver half of the retry channel
    /// (hand it to [`super::AuditWorker::run`]).
    pub fn new(
        storage: LifecycleStorage,
        retry_buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<LifecycleEvent>) {
        let (retry_tx, retry_rx) = mpsc::channel(retry_buffer);
        (
            Arc::new(Self { storage, retry_tx }),
            retry_rx,
        )
    }

    /// Append one audit event. Infallible from the caller's view.
    pub async fn record(
        &self,
        resource_id: &str,
        actor: &Actor,
        event_type: &str,
        payload: Value,
    ) {
        let event = LifecycleEvent::new(resource_id, actor, event_type, payload);
        if let Err(e) = self.append(&event) {
            tracing::error!(
                resource_id,
                event_type,
                error = %e,
                "Failed to append audit event, queueing for retry"
            );
            if self.retry_tx.send(event).await.is_err() {
                tracing::error!(resource_id, event_type, "Audit retry channel closed, event lost");
            }
        }
    }

    fn append(&self, event: &LifecycleEvent) -> AppResult<()> {
        let txn = self.storage.begin_write()?;
        let mut event = event.clone();
        self.storage.append_event(&txn, &mut event)?;
        txn.commit().map_err(|e| AppError::storage(e.to_string()))?;
        Ok(())
    }

    /// Events for one resource, oldest first
    pub fn events_for(&self, resource_id: &str) -> AppResult<Vec<LifecycleEvent>> {
        Ok(self.storage.events_for_resource(resource_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_appends_one_event_per_attempt() {
        let storage = LifecycleStorage::open_in_memory().unwrap();
        let (audit, _rx) = AuditService::new(storage, 16);

        let actor = Actor::admin("adm-1");
        audit.record("dlv-1", &actor, "assign", json!({"driver": "drv-1"})).await;
        audit
            .record("dlv-1", &actor, "assign_denied", json!({"code": 3001}))
            .await;

        let events = audit.events_for("dlv-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "assign");
        assert_eq!(events[1].event_type, "assign_denied");
        assert!(events[0].sequence < events[1].sequence);
    }
}
