//! Webhook reconciliation
//!
//! Provider webhooks arrive at-least-once and in no particular order
//! relative to user actions. Reconciliation keys off the external
//! intent ref, never arrival order; the `processed_webhooks` marker is
//! written in the same transaction as the state change it produced, so
//! a replayed event is acknowledged without a second application or a
//! duplicate audit entry.

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{Actor, AppError, AppResult, PaymentState, RentalStatus, ResourceKey};

use super::LifecycleAuthority;
use crate::lifecycle::gate::{self, DeliveryAction, DeliveryFacts, Gate, RentalAction};

/// Provider-verified webhook event (signature already checked upstream)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// External payment intent reference
    pub intent_ref: String,
    pub outcome: WebhookOutcome,
    /// Provider-side event id, unique per delivery attempt set
    pub raw_event_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The hold is confirmed on the provider side
    AuthorizationConfirmed,
    /// The hold was captured (rent + deposit collected)
    Captured,
    /// The hold was released
    Voided,
}

impl LifecycleAuthority {
    /// Apply a provider webhook event exactly once.
    ///
    /// Always acknowledges: replays, unknown refs and out-of-sequence
    /// outcomes are logged and dropped rather than surfaced, since the
    /// caller is the provider, not an end user.
    pub async fn reconcile(&self, event: &WebhookEvent) -> AppResult<()> {
        if self.storage().is_webhook_processed(&event.raw_event_id)? {
            tracing::debug!(raw_event_id = %event.raw_event_id, "Webhook replay, already applied");
            return Ok(());
        }

        let Some(key) = self.storage().get_intent_resource(&event.intent_ref)? else {
            tracing::warn!(
                intent_ref = %event.intent_ref,
                raw_event_id = %event.raw_event_id,
                "Webhook references an unknown payment intent"
            );
            return Ok(());
        };

        let lock = self.resource_lock(key.id());
        let result = {
            let _guard = lock.lock().await;

            // Re-check under the lock: two replays can race past the
            // first check
            match self.storage().is_webhook_processed(&event.raw_event_id) {
                Ok(true) => Ok(()),
                Err(e) => Err(e.into()),
                Ok(false) => match &key {
                    ResourceKey::Delivery(id) => self.reconcile_delivery(id, event).await,
                    ResourceKey::Rental(id) => self.reconcile_rental(id, event).await,
                },
            }
        };

        drop(lock);
        self.prune_lock(key.id());
        result
    }

    async fn reconcile_delivery(&self, id: &str, event: &WebhookEvent) -> AppResult<()> {
        let actor = Actor::system();
        let snapshot = self.get_delivery(id)?;

        match event.outcome {
            WebhookOutcome::AuthorizationConfirmed => {
                let action = DeliveryAction::ConfirmAuthorization;
                match gate::evaluate_delivery(&snapshot, &action, &actor, &DeliveryFacts::default())
                {
                    Ok(Gate::Proceed) => {
                        let mut next = snapshot.clone();
                        next.status = shared::DeliveryStatus::AwaitingPickupPhoto;
                        self.commit_delivery(
                            &snapshot,
                            &mut next,
                            None,
                            Some(&event.raw_event_id),
                        )?;
                        self.audit
                            .record(
                                id,
                                &actor,
                                "authorization_confirmed",
                                json!({"intent_ref": event.intent_ref}),
                            )
                            .await;
                    }
                    Ok(Gate::Noop) => self.mark_processed_only(event)?,
                    Err(deny) => self.drop_out_of_sequence(id, event, deny.code)?,
                }
            }

            WebhookOutcome::Captured => {
                // Repair path: a capture confirmed provider-side before
                // the local completion committed
                if snapshot.payment_state == PaymentState::Authorized {
                    let mut next = snapshot.clone();
                    next.payment_state = PaymentState::Captured;
                    self.commit_delivery(
                        &snapshot,
                        &mut next,
                        None,
                        Some(&event.raw_event_id),
                    )?;
                    self.audit
                        .record(
                            id,
                            &actor,
                            "payment_captured",
                            json!({"intent_ref": event.intent_ref}),
                        )
                        .await;
                } else {
                    self.mark_processed_only(event)?;
                }
            }

            WebhookOutcome::Voided => {
                if snapshot.payment_state == PaymentState::Authorized {
                    let mut next = snapshot.clone();
                    next.payment_state = PaymentState::Voided;
                    self.commit_delivery(
                        &snapshot,
                        &mut next,
                        None,
                        Some(&event.raw_event_id),
                    )?;
                    self.audit
                        .record(
                            id,
                            &actor,
                            "payment_voided",
                            json!({"intent_ref": event.intent_ref}),
                        )
                        .await;
                } else {
                    self.mark_processed_only(event)?;
                }
            }
        }

        Ok(())
    }

    async fn reconcile_rental(&self, id: &str, event: &WebhookEvent) -> AppResult<()> {
        let actor = Actor::system();
        let snapshot = self.get_rental(id)?;

        match event.outcome {
            WebhookOutcome::Captured => {
                let action = RentalAction::PaymentCompleted;
                match gate::evaluate_rental(&snapshot, &action, &actor) {
                    Ok(Gate::Proceed) => {
                        let mut next = snapshot.clone();
                        next.paid = true;
                        next.status = RentalStatus::Active;
                        next.payment_state = PaymentState::Captured;
                        self.commit_rental(
                            &snapshot,
                            &mut next,
                            None,
                            Some(&event.raw_event_id),
                        )?;
                        self.audit
                            .record(
                                id,
                                &actor,
                                "payment_completed",
                                json!({"intent_ref": event.intent_ref}),
                            )
                            .await;
                        self.notifier
                            .notify(&next.owner_id, "rental_paid", json!({"rental_id": id}))
                            .await;
                    }
                    Ok(Gate::Noop) => self.mark_processed_only(event)?,
                    Err(deny) => self.drop_out_of_sequence(id, event, deny.code)?,
                }
            }

            WebhookOutcome::Voided => {
                if snapshot.payment_state == PaymentState::Authorized {
                    let mut next = snapshot.clone();
                    next.payment_state = PaymentState::Voided;
                    self.commit_rental(
                        &snapshot,
                        &mut next,
                        None,
                        Some(&event.raw_event_id),
                    )?;
                    self.audit
                        .record(
                            id,
                            &actor,
                            "payment_voided",
                            json!({"intent_ref": event.intent_ref}),
                        )
                        .await;
                } else {
                    self.mark_processed_only(event)?;
                }
            }

            // Rentals move to awaiting_payment locally at signing; the
            // provider-side confirmation carries no extra transition
            WebhookOutcome::AuthorizationConfirmed => self.mark_processed_only(event)?,
        }

        Ok(())
    }

    /// Acknowledge without state change or audit entry
    fn mark_processed_only(&self, event: &WebhookEvent) -> AppResult<()> {
        let txn = self.storage().begin_write()?;
        self.storage()
            .mark_webhook_processed(&txn, &event.raw_event_id)?;
        txn.commit()
            .map_err(|e| AppError::storage(e.to_string()))?;
        Ok(())
    }

    fn drop_out_of_sequence(
        &self,
        id: &str,
        event: &WebhookEvent,
        code: shared::ErrorCode,
    ) -> AppResult<()> {
        tracing::warn!(
            resource_id = id,
            raw_event_id = %event.raw_event_id,
            outcome = ?event.outcome,
            %code,
            "Webhook outcome does not fit current state, dropping"
        );
        self.mark_processed_only(event)
    }
}
