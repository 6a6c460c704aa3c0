//! Delivery operations

use serde_json::json;
use shared::{
    Actor, ActorRole, AppError, AppResult, DeliverySnapshot, DeliveryStatus, PaymentState,
};

use super::LifecycleAuthority;
use crate::collaborators::PhotoPhase;
use crate::lifecycle::gate::{self, DeliveryAction, DeliveryFacts, Gate};

impl LifecycleAuthority {
    /// Create a delivery draft owned by the calling customer
    pub async fn create_delivery(
        &self,
        actor: &Actor,
        amount_cents: i64,
        currency: &str,
    ) -> AppResult<DeliverySnapshot> {
        let owner_id = match (&actor.role, &actor.id) {
            (ActorRole::Customer, Some(id)) => id.clone(),
            _ => return Err(AppError::forbidden("Only customers can create deliveries")),
        };
        if amount_cents <= 0 {
            return Err(AppError::validation("amount_cents must be positive"));
        }

        let snapshot =
            DeliverySnapshot::new_draft(shared::util::new_id(), owner_id, amount_cents, currency);

        let txn = self.storage().begin_write()?;
        self.storage().insert_delivery(&txn, &snapshot)?;
        txn.commit()
            .map_err(|e| AppError::storage(e.to_string()))?;

        self.audit
            .record(
                &snapshot.id,
                actor,
                "created",
                json!({"amount_cents": amount_cents, "currency": currency}),
            )
            .await;

        Ok(snapshot)
    }

    /// Owner checkout: place the payment hold and move the draft to
    /// `authorized`. Safe to retry; an existing hold is reused.
    pub async fn checkout_delivery(&self, actor: &Actor, id: &str) -> AppResult<DeliverySnapshot> {
        self.run_locked(id, || self.checkout_delivery_inner(actor, id))
            .await
    }

    async fn checkout_delivery_inner(&self, actor: &Actor, id: &str) -> AppResult<DeliverySnapshot> {
        let snapshot = self.get_delivery(id)?;
        let action = DeliveryAction::Checkout;

        match gate::evaluate_delivery(&snapshot, &action, actor, &DeliveryFacts::default()) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, action.name(), json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                let outcome = match self
                    .orchestrator
                    .authorize(
                        snapshot.payment_intent_ref.as_deref(),
                        snapshot.payment_state,
                        snapshot.amount_cents,
                        &snapshot.currency,
                        json!({"resource": id}),
                    )
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.audit_failure(id, actor, action.name(), &e).await;
                        return Err(e);
                    }
                };
                let intent_ref = outcome.intent_ref().to_string();

                let mut next = snapshot.clone();
                next.status = DeliveryStatus::Authorized;
                next.payment_state = PaymentState::Authorized;
                next.payment_intent_ref = Some(intent_ref.clone());
                self.commit_delivery(&snapshot, &mut next, Some(&intent_ref), None)?;

                // The transition itself is applied post-checkout by the
                // system, on the requester's behalf
                self.audit
                    .record(
                        id,
                        &Actor::system(),
                        action.name(),
                        json!({
                            "requested_by": actor.id,
                            "amount_cents": next.amount_cents,
                            "intent_ref": intent_ref,
                        }),
                    )
                    .await;
                Ok(next)
            }
        }
    }

    /// Photo-store callback: a pickup photo was recorded, the delivery
    /// becomes dispatchable.
    pub async fn record_pickup_photo(&self, id: &str) -> AppResult<DeliverySnapshot> {
        self.run_locked(id, || self.record_pickup_photo_inner(id))
            .await
    }

    async fn record_pickup_photo_inner(&self, id: &str) -> AppResult<DeliverySnapshot> {
        let actor = Actor::system();
        let snapshot = self.get_delivery(id)?;
        let action = DeliveryAction::RecordPickupPhoto;

        match gate::evaluate_delivery(&snapshot, &action, &actor, &DeliveryFacts::default()) {
            Err(deny) => Err(self.audit_denial(id, &actor, action.name(), deny).await),
            Ok(Gate::Noop) => Ok(snapshot),
            Ok(Gate::Proceed) => {
                let mut next = snapshot.clone();
                next.status = DeliveryStatus::ReadyForDispatch;
                self.commit_delivery(&snapshot, &mut next, None, None)?;

                self.audit.record(id, &actor, action.name(), json!({})).await;
                Ok(next)
            }
        }
    }

    /// Admin assigns (or reassigns) a driver
    pub async fn assign_driver(
        &self,
        actor: &Actor,
        id: &str,
        driver_id: &str,
    ) -> AppResult<DeliverySnapshot> {
        self.run_locked(id, || self.assign_driver_inner(actor, id, driver_id))
            .await
    }

    async fn assign_driver_inner(
        &self,
        actor: &Actor,
        id: &str,
        driver_id: &str,
    ) -> AppResult<DeliverySnapshot> {
        let snapshot = self.get_delivery(id)?;
        let action = DeliveryAction::AssignDriver { driver_id };

        match gate::evaluate_delivery(&snapshot, &action, actor, &DeliveryFacts::default()) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(_) => {
                let previous = snapshot.assignee_id.clone();
                let reassigned = previous.is_some();

                let mut next = snapshot.clone();
                next.status = DeliveryStatus::Assigned;
                next.assignee_id = Some(driver_id.to_string());
                self.commit_delivery(&snapshot, &mut next, None, None)?;

                let event_type = if reassigned {
                    "driver_reassigned"
                } else {
                    "driver_assigned"
                };
                self.audit
                    .record(
                        id,
                        actor,
                        event_type,
                        json!({"driver_id": driver_id, "previous": previous}),
                    )
                    .await;
                self.notifier
                    .notify(driver_id, "delivery_assigned", json!({"delivery_id": id}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Assigned driver starts the run
    pub async fn start_transit(&self, actor: &Actor, id: &str) -> AppResult<DeliverySnapshot> {
        self.run_locked(id, || self.start_transit_inner(actor, id))
            .await
    }

    async fn start_transit_inner(&self, actor: &Actor, id: &str) -> AppResult<DeliverySnapshot> {
        let snapshot = self.get_delivery(id)?;
        let action = DeliveryAction::StartTransit;

        match gate::evaluate_delivery(&snapshot, &action, actor, &DeliveryFacts::default()) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(_) => {
                let mut next = snapshot.clone();
                next.status = DeliveryStatus::InTransit;
                self.commit_delivery(&snapshot, &mut next, None, None)?;

                self.audit.record(id, actor, "transit_started", json!({})).await;
                self.notifier
                    .notify(&next.owner_id, "delivery_in_transit", json!({"delivery_id": id}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Complete the delivery: requires dropoff proof, captures the
    /// payment. Capture failure leaves the delivery `in_transit` and is
    /// retryable; re-completing an already-completed delivery succeeds
    /// without touching the provider.
    pub async fn complete_delivery(&self, actor: &Actor, id: &str) -> AppResult<DeliverySnapshot> {
        self.run_locked(id, || self.complete_delivery_inner(actor, id))
            .await
    }

    async fn complete_delivery_inner(&self, actor: &Actor, id: &str) -> AppResult<DeliverySnapshot> {
        let snapshot = self.get_delivery(id)?;
        let action = DeliveryAction::Complete;
        let facts = DeliveryFacts {
            dropoff_photo: self.photos.has_photo(id, PhotoPhase::Dropoff).await,
        };

        match gate::evaluate_delivery(&snapshot, &action, actor, &facts) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, "completed", json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                if let Err(e) = self
                    .orchestrator
                    .capture(snapshot.payment_intent_ref.as_deref(), snapshot.payment_state)
                    .await
                {
                    self.audit_failure(id, actor, action.name(), &e).await;
                    return Err(e);
                }

                let mut next = snapshot.clone();
                next.status = DeliveryStatus::Completed;
                next.payment_state = PaymentState::Captured;
                self.commit_delivery(&snapshot, &mut next, None, None)?;

                self.audit
                    .record(
                        id,
                        actor,
                        "completed",
                        json!({"intent_ref": next.payment_intent_ref}),
                    )
                    .await;
                self.notifier
                    .notify(&next.owner_id, "delivery_completed", json!({"delivery_id": id}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Owner or admin cancels; an authorized hold is voided before the
    /// cancellation commits so funds are never left dangling.
    pub async fn cancel_delivery(
        &self,
        actor: &Actor,
        id: &str,
        reason: &str,
    ) -> AppResult<DeliverySnapshot> {
        self.run_locked(id, || self.cancel_delivery_inner(actor, id, reason))
            .await
    }

    async fn cancel_delivery_inner(
        &self,
        actor: &Actor,
        id: &str,
        reason: &str,
    ) -> AppResult<DeliverySnapshot> {
        let snapshot = self.get_delivery(id)?;
        let action = DeliveryAction::Cancel { reason };

        match gate::evaluate_delivery(&snapshot, &action, actor, &DeliveryFacts::default()) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, "cancelled", json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                let mut next = snapshot.clone();
                let voided = if snapshot.payment_state == PaymentState::Authorized {
                    if let Err(e) = self
                        .orchestrator
                        .void(snapshot.payment_intent_ref.as_deref(), snapshot.payment_state)
                        .await
                    {
                        self.audit_failure(id, actor, action.name(), &e).await;
                        return Err(e);
                    }
                    next.payment_state = PaymentState::Voided;
                    true
                } else {
                    false
                };

                next.status = DeliveryStatus::Cancelled;
                next.cancelled_at = Some(shared::util::now_millis());
                next.cancel_reason = Some(reason.to_string());
                self.commit_delivery(&snapshot, &mut next, None, None)?;

                self.audit
                    .record(
                        id,
                        actor,
                        "cancelled",
                        json!({"reason": reason, "payment_voided": voided}),
                    )
                    .await;
                self.notifier
                    .notify(&next.owner_id, "delivery_cancelled", json!({"delivery_id": id}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Owner deletes a draft. The row goes away; its events remain.
    pub async fn delete_draft_delivery(&self, actor: &Actor, id: &str) -> AppResult<()> {
        self.run_locked(id, || self.delete_draft_delivery_inner(actor, id))
            .await
    }

    async fn delete_draft_delivery_inner(&self, actor: &Actor, id: &str) -> AppResult<()> {
        let snapshot = self.get_delivery(id)?;
        let action = DeliveryAction::DeleteDraft;

        match gate::evaluate_delivery(&snapshot, &action, actor, &DeliveryFacts::default()) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(_) => {
                let txn = self.storage().begin_write()?;
                self.storage().remove_delivery(&txn, id)?;
                txn.commit()
                    .map_err(|e| AppError::storage(e.to_string()))?;

                self.audit.record(id, actor, "draft_deleted", json!({})).await;
                Ok(())
            }
        }
    }
}
