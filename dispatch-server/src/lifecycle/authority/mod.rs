//! Transition authority - the state-machine driver
//!
//! Every mutation of a delivery or rental goes through here:
//!
//! 1. load the latest snapshot (`NotFound` if missing),
//! 2. `gate::evaluate*` against it (denials are audited as
//!    `<action>_denied` and surfaced),
//! 3. run the payment side effect where the transition has one
//!    (authorize on checkout/sign, capture on completion, void before
//!    cancel),
//! 4. conditional write: the transaction re-reads the row and compares
//!    `version`; a mismatch re-runs the whole cycle once, then
//!    surfaces `Conflict`,
//! 5. append the audit event after commit (best-effort),
//! 6. fire notifications (failures swallowed).
//!
//! Units of work for the same resource are additionally serialized on
//! a per-resource async mutex so a payment-provider call is made at
//! most once per decided transition; the version compare at write time
//! remains the guard on the data itself.

mod delivery;
mod rental;
mod webhook;

pub use rental::ReviewDecision;
pub use webhook::{WebhookEvent, WebhookOutcome};

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use shared::{Actor, AppError, AppResult, DeliverySnapshot, ErrorCode, RentalSnapshot, ResourceKey};
use tokio::sync::Mutex;

use crate::audit::AuditService;
use crate::collaborators::{Notifier, PhotoStore};
use crate::lifecycle::gate::Deny;
use crate::lifecycle::LifecycleStorage;
use crate::payments::PaymentOrchestrator;

pub struct LifecycleAuthority {
    storage: LifecycleStorage,
    orchestrator: PaymentOrchestrator,
    audit: Arc<AuditService>,
    photos: Arc<dyn PhotoStore>,
    notifier: Arc<dyn Notifier>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LifecycleAuthority {
    pub fn new(
        storage: LifecycleStorage,
        orchestrator: PaymentOrchestrator,
        audit: Arc<AuditService>,
        photos: Arc<dyn PhotoStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            storage,
            orchestrator,
            audit,
            photos,
            notifier,
            locks: DashMap::new(),
        }
    }

    pub fn storage(&self) -> &LifecycleStorage {
        &self.storage
    }

    // ========== Snapshot reads ==========

    pub fn get_delivery(&self, id: &str) -> AppResult<DeliverySnapshot> {
        self.storage
            .get_delivery(id)?
            .ok_or_else(|| AppError::not_found(format!("Delivery {}", id)))
    }

    pub fn get_rental(&self, id: &str) -> AppResult<RentalSnapshot> {
        self.storage
            .get_rental(id)?
            .ok_or_else(|| AppError::not_found(format!("Rental {}", id)))
    }

    // ========== Unit-of-work plumbing ==========

    fn resource_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(id.to_string()).or_default().clone()
    }

    /// Drop the lock entry once no unit of work holds a handle to it.
    ///
    /// The predicate runs under the map's shard lock, so a concurrent
    /// `resource_lock` either clones the Arc first (strong count > 1,
    /// no removal) or gets a fresh entry after removal.
    fn prune_lock(&self, id: &str) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub(crate) fn held_locks(&self) -> usize {
        self.locks.len()
    }

    /// Serialize on the resource and give the conditional write one
    /// internal re-evaluation before surfacing `Conflict`.
    async fn run_locked<T, F, Fut>(&self, id: &str, op: F) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        let lock = self.resource_lock(id);
        let result = {
            let _guard = lock.lock().await;

            match op().await {
                Err(e) if e.code == ErrorCode::Conflict => {
                    tracing::debug!(resource_id = id, "Conditional write lost a race, re-evaluating");
                    op().await
                }
                result => result,
            }
        };

        drop(lock);
        self.prune_lock(id);
        result
    }

    /// Audit a gate denial and convert it into the surfaced error
    async fn audit_denial(
        &self,
        resource_id: &str,
        actor: &Actor,
        action_name: &str,
        deny: Deny,
    ) -> AppError {
        self.audit
            .record(
                resource_id,
                actor,
                &format!("{action_name}_denied"),
                json!({"code": deny.code, "detail": deny.detail.clone()}),
            )
            .await;
        deny.into()
    }

    /// Audit a failed payment side effect (provider error); state was
    /// left unchanged and the caller may retry.
    async fn audit_failure(
        &self,
        resource_id: &str,
        actor: &Actor,
        action_name: &str,
        err: &AppError,
    ) {
        self.audit
            .record(
                resource_id,
                actor,
                &format!("{action_name}_failed"),
                json!({"code": err.code, "message": err.message}),
            )
            .await;
    }

    // ========== Conditional writes ==========

    /// Commit a delivery transition.
    ///
    /// The conditional write compares `prev.version`, so a successful
    /// commit proves `prev` was the stored row; the forward-only
    /// payment check against it can therefore never pass on stale data.
    /// `intent_index` additionally maps a freshly created payment ref
    /// to this resource; `processed_webhook` marks a webhook event as
    /// applied in the same transaction as the state it produced.
    fn commit_delivery(
        &self,
        prev: &DeliverySnapshot,
        next: &mut DeliverySnapshot,
        intent_index: Option<&str>,
        processed_webhook: Option<&str>,
    ) -> AppResult<()> {
        if !prev.payment_state.can_advance_to(next.payment_state) {
            return Err(AppError::with_message(
                ErrorCode::PaymentInvariantViolation,
                format!(
                    "payment_state cannot move from {} to {}",
                    prev.payment_state, next.payment_state
                ),
            ));
        }
        next.version = prev.version + 1;
        next.updated_at = shared::util::now_millis();

        let txn = self.storage.begin_write()?;
        if !self
            .storage
            .update_delivery_if(&txn, &next.id, prev.version, next)?
        {
            return Err(AppError::conflict(format!(
                "Delivery {} was updated concurrently",
                next.id
            )));
        }
        if let Some(intent_ref) = intent_index {
            self.storage
                .put_intent_index(&txn, intent_ref, &ResourceKey::Delivery(next.id.clone()))?;
        }
        if let Some(raw_event_id) = processed_webhook {
            self.storage.mark_webhook_processed(&txn, raw_event_id)?;
        }
        txn.commit()
            .map_err(|e| AppError::storage(e.to_string()))?;
        Ok(())
    }

    /// Commit a rental transition (see [`Self::commit_delivery`])
    fn commit_rental(
        &self,
        prev: &RentalSnapshot,
        next: &mut RentalSnapshot,
        intent_index: Option<&str>,
        processed_webhook: Option<&str>,
    ) -> AppResult<()> {
        if !prev.payment_state.can_advance_to(next.payment_state) {
            return Err(AppError::with_message(
                ErrorCode::PaymentInvariantViolation,
                format!(
                    "payment_state cannot move from {} to {}",
                    prev.payment_state, next.payment_state
                ),
            ));
        }
        next.version = prev.version + 1;
        next.updated_at = shared::util::now_millis();

        let txn = self.storage.begin_write()?;
        if !self
            .storage
            .update_rental_if(&txn, &next.id, prev.version, next)?
        {
            return Err(AppError::conflict(format!(
                "Rental {} was updated concurrently",
                next.id
            )));
        }
        if let Some(intent_ref) = intent_index {
            self.storage
                .put_intent_index(&txn, intent_ref, &ResourceKey::Rental(next.id.clone()))?;
        }
        if let Some(raw_event_id) = processed_webhook {
            self.storage.mark_webhook_processed(&txn, raw_event_id)?;
        }
        txn.commit()
            .map_err(|e| AppError::storage(e.to_string()))?;
        Ok(())
    }
}
