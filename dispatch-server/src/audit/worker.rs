//! Audit retry worker
//!
//! Consumes events whose first append failed and retries with backoff.
//! An event that keeps failing is dropped with an `error!` record so
//! operators can see the loss. Exits when the channel closes.

use std::time::Duration;

use shared::LifecycleEvent;
use tokio::sync::mpsc;

use crate::lifecycle::LifecycleStorage;

const MAX_RETRIES: u32 = 5;
const RETRY_BASE_DELAY_MS: u64 = 200;

pub struct AuditWorker {
    storage: LifecycleStorage,
}

impl AuditWorker {
    pub fn new(storage: LifecycleStorage) -> Self {
        Self { storage }
    }

    /// Run until the retry channel closes
    pub async fn run(self, mut rx: mpsc::Receiver<LifecycleEvent>) {
        tracing::info!("📋 Audit retry worker started");

        while let Some(event) = rx.recv().await {
            self.retry_append(event).await;
        }

        tracing::info!("Audit retry channel closed, worker stopping");
    }

    async fn retry_append(&self, mut event: LifecycleEvent) {
        for attempt in 1..=MAX_RETRIES {
            match self.try_append(&mut event) {
                Ok(seq) => {
                    tracing::debug!(
                        resource_id = %event.resource_id,
                        event_type = %event.event_type,
                        sequence = seq,
                        "Audit event recovered on retry"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        resource_id = %event.resource_id,
                        event_type = %event.event_type,
                        attempt,
                        error = %e,
                        "Audit retry failed"
                    );
                    tokio::time::sleep(Duration::from_millis(
                        RETRY_BASE_DELAY_MS * u64::from(attempt),
                    ))
                    .await;
                }
            }
        }
        tracing::error!(
            resource_id = %event.resource_id,
            event_type = %event.event_type,
            "Audit event dropped after {MAX_RETRIES} retries"
        );
    }

    fn try_append(&self, event: &mut LifecycleEvent) -> Result<u64, crate::lifecycle::StorageError> {
        let txn = self.storage.begin_write()?;
        let seq = self.storage.append_event(&txn, event)?;
        txn.commit()?;
        Ok(seq)
    }
}
