//! Rental operations

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    Actor, ActorRole, AppError, AppResult, DepositRefundStatus, PaymentState, RentalPurpose,
    RentalSnapshot, RentalStatus, VerificationStatus,
};

use super::LifecycleAuthority;
use crate::lifecycle::gate::{self, DepositDecision, Gate, RentalAction};

/// Admin review decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Deny,
}

impl LifecycleAuthority {
    /// Create a rental draft owned by the calling customer
    pub async fn create_rental(
        &self,
        actor: &Actor,
        rent_cents: i64,
        deposit_cents: i64,
        currency: &str,
        docs_complete: bool,
    ) -> AppResult<RentalSnapshot> {
        let owner_id = match (&actor.role, &actor.id) {
            (ActorRole::Customer, Some(id)) => id.clone(),
            _ => return Err(AppError::forbidden("Only customers can create rentals")),
        };
        if rent_cents <= 0 || deposit_cents < 0 {
            return Err(AppError::validation("rent and deposit amounts must be positive"));
        }

        let mut snapshot = RentalSnapshot::new_draft(
            shared::util::new_id(),
            owner_id,
            rent_cents,
            deposit_cents,
            currency,
        );
        snapshot.docs_complete = docs_complete;

        let txn = self.storage().begin_write()?;
        self.storage().insert_rental(&txn, &snapshot)?;
        txn.commit()
            .map_err(|e| AppError::storage(e.to_string()))?;

        self.audit
            .record(
                &snapshot.id,
                actor,
                "created",
                json!({
                    "rent_cents": rent_cents,
                    "deposit_cents": deposit_cents,
                    "currency": currency,
                }),
            )
            .await;

        Ok(snapshot)
    }

    /// Owner submits the application for review
    pub async fn submit_rental(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        self.run_locked(id, || self.submit_rental_inner(actor, id))
            .await
    }

    async fn submit_rental_inner(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        let snapshot = self.get_rental(id)?;
        let action = RentalAction::Submit;

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, "submitted", json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                let mut next = snapshot.clone();
                next.status = RentalStatus::Submitted;
                self.commit_rental(&snapshot, &mut next, None, None)?;

                self.audit.record(id, actor, "submitted", json!({})).await;
                Ok(next)
            }
        }
    }

    /// Admin reviews the application. Approval also marks the renter's
    /// verification approved; denial records the reason on the rental
    /// and echoes it in the event payload.
    pub async fn review_rental(
        &self,
        actor: &Actor,
        id: &str,
        decision: ReviewDecision,
        reason: Option<&str>,
    ) -> AppResult<RentalSnapshot> {
        self.run_locked(id, || self.review_rental_inner(actor, id, decision, reason))
            .await
    }

    async fn review_rental_inner(
        &self,
        actor: &Actor,
        id: &str,
        decision: ReviewDecision,
        reason: Option<&str>,
    ) -> AppResult<RentalSnapshot> {
        let snapshot = self.get_rental(id)?;
        let action = match decision {
            ReviewDecision::Approve => RentalAction::Approve,
            ReviewDecision::Deny => RentalAction::DenyApplication {
                reason: reason.unwrap_or(""),
            },
        };

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                let event_type = match decision {
                    ReviewDecision::Approve => "approved",
                    ReviewDecision::Deny => "denied",
                };
                self.audit
                    .record(id, actor, event_type, json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                let mut next = snapshot.clone();
                let (event_type, payload) = match decision {
                    ReviewDecision::Approve => {
                        next.status = RentalStatus::Approved;
                        next.verification_status = VerificationStatus::Approved;
                        ("approved", json!({}))
                    }
                    ReviewDecision::Deny => {
                        let reason = reason.unwrap_or("").to_string();
                        next.status = RentalStatus::Denied;
                        next.verification_status = VerificationStatus::Denied;
                        next.denial_reason = Some(reason.clone());
                        ("denied", json!({"reason": reason}))
                    }
                };
                self.commit_rental(&snapshot, &mut next, None, None)?;

                self.audit.record(id, actor, event_type, payload).await;
                self.notifier
                    .notify(&next.owner_id, "rental_reviewed", json!({"rental_id": id, "decision": event_type}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Owner signs the agreement, declaring a purpose. Places the hold
    /// for rent plus deposit and moves the rental to awaiting_payment.
    pub async fn sign_agreement(
        &self,
        actor: &Actor,
        id: &str,
        purpose: &str,
    ) -> AppResult<RentalSnapshot> {
        self.run_locked(id, || self.sign_agreement_inner(actor, id, purpose))
            .await
    }

    async fn sign_agreement_inner(
        &self,
        actor: &Actor,
        id: &str,
        purpose: &str,
    ) -> AppResult<RentalSnapshot> {
        let snapshot = self.get_rental(id)?;
        let action = RentalAction::Sign { purpose };

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, "agreement_signed", json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                // Gate already validated the purpose
                let purpose = RentalPurpose::parse(purpose)
                    .ok_or_else(|| AppError::invalid("unknown rental purpose"))?;

                let outcome = match self
                    .orchestrator
                    .authorize(
                        snapshot.payment_intent_ref.as_deref(),
                        snapshot.payment_state,
                        snapshot.total_cents(),
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
                next.agreement_signed = true;
                next.purpose = Some(purpose);
                next.status = RentalStatus::AwaitingPayment;
                next.payment_state = PaymentState::Authorized;
                next.payment_intent_ref = Some(intent_ref.clone());
                self.commit_rental(&snapshot, &mut next, Some(&intent_ref), None)?;

                self.audit
                    .record(
                        id,
                        actor,
                        "agreement_signed",
                        json!({
                            "purpose": purpose.as_str(),
                            "amount_cents": next.total_cents(),
                            "intent_ref": intent_ref,
                        }),
                    )
                    .await;
                Ok(next)
            }
        }
    }

    /// Admin opens the lockbox; allowed any time once payment is in
    pub async fn release_lockbox(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        self.run_locked(id, || self.release_lockbox_inner(actor, id))
            .await
    }

    async fn release_lockbox_inner(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        let snapshot = self.get_rental(id)?;
        let action = RentalAction::ReleaseLockbox;

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, "lockbox_released", json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                let mut next = snapshot.clone();
                next.lockbox_released_at = Some(shared::util::now_millis());
                self.commit_rental(&snapshot, &mut next, None, None)?;

                self.audit.record(id, actor, "lockbox_released", json!({})).await;
                self.notifier
                    .notify(&next.owner_id, "lockbox_released", json!({"rental_id": id}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Owner confirms vehicle pickup; requires approved verification,
    /// payment, and a released lockbox. Repeat confirmations succeed
    /// without rewriting the timestamp.
    pub async fn confirm_pickup(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        self.run_locked(id, || self.confirm_pickup_inner(actor, id))
            .await
    }

    async fn confirm_pickup_inner(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        let snapshot = self.get_rental(id)?;
        let action = RentalAction::ConfirmPickup;

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, "pickup_confirmed", json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                let mut next = snapshot.clone();
                next.status = RentalStatus::PickupConfirmed;
                next.pickup_confirmed_at = Some(shared::util::now_millis());
                self.commit_rental(&snapshot, &mut next, None, None)?;

                self.audit.record(id, actor, "pickup_confirmed", json!({})).await;
                Ok(next)
            }
        }
    }

    /// Admin confirms the vehicle came back; the rental completes and
    /// the deposit goes into pending settlement.
    pub async fn confirm_return(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        self.run_locked(id, || self.confirm_return_inner(actor, id))
            .await
    }

    async fn confirm_return_inner(&self, actor: &Actor, id: &str) -> AppResult<RentalSnapshot> {
        let snapshot = self.get_rental(id)?;
        let action = RentalAction::ConfirmReturn;

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(Gate::Noop) => {
                self.audit
                    .record(id, actor, "return_confirmed", json!({"idempotent": true}))
                    .await;
                Ok(snapshot)
            }
            Ok(Gate::Proceed) => {
                let mut next = snapshot.clone();
                next.status = RentalStatus::Completed;
                next.return_confirmed_at = Some(shared::util::now_millis());
                next.deposit_refund_status = DepositRefundStatus::Pending;
                self.commit_rental(&snapshot, &mut next, None, None)?;

                self.audit.record(id, actor, "return_confirmed", json!({})).await;
                self.notifier
                    .notify(&next.owner_id, "rental_completed", json!({"rental_id": id}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Admin settles the deposit. Terminal: once refunded or withheld,
    /// further attempts are rejected with `AlreadyResolved`.
    pub async fn resolve_deposit(
        &self,
        actor: &Actor,
        id: &str,
        decision: DepositDecision,
        reason: Option<&str>,
        amount_cents: Option<i64>,
    ) -> AppResult<RentalSnapshot> {
        self.run_locked(id, || {
            self.resolve_deposit_inner(actor, id, decision, reason, amount_cents)
        })
        .await
    }

    async fn resolve_deposit_inner(
        &self,
        actor: &Actor,
        id: &str,
        decision: DepositDecision,
        reason: Option<&str>,
        amount_cents: Option<i64>,
    ) -> AppResult<RentalSnapshot> {
        let snapshot = self.get_rental(id)?;
        let action = RentalAction::ResolveDeposit {
            decision,
            reason,
            amount_cents,
        };

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(_) => {
                let mut next = snapshot.clone();
                next.status = RentalStatus::DepositResolved;
                match decision {
                    DepositDecision::Refunded => {
                        next.deposit_refund_status = DepositRefundStatus::Refunded;
                    }
                    DepositDecision::Withheld => {
                        next.deposit_refund_status = DepositRefundStatus::Withheld;
                        next.deposit_withheld_reason = reason.map(str::to_string);
                        next.deposit_withheld_cents = amount_cents;
                    }
                }
                self.commit_rental(&snapshot, &mut next, None, None)?;

                self.audit
                    .record(
                        id,
                        actor,
                        "deposit_resolved",
                        json!({
                            "decision": decision,
                            "reason": reason,
                            "amount_cents": amount_cents,
                        }),
                    )
                    .await;
                self.notifier
                    .notify(&next.owner_id, "deposit_resolved", json!({"rental_id": id}))
                    .await;
                Ok(next)
            }
        }
    }

    /// Owner deletes a draft. The row goes away; its events remain.
    pub async fn delete_draft_rental(&self, actor: &Actor, id: &str) -> AppResult<()> {
        self.run_locked(id, || self.delete_draft_rental_inner(actor, id))
            .await
    }

    async fn delete_draft_rental_inner(&self, actor: &Actor, id: &str) -> AppResult<()> {
        let snapshot = self.get_rental(id)?;
        let action = RentalAction::DeleteDraft;

        match gate::evaluate_rental(&snapshot, &action, actor) {
            Err(deny) => Err(self.audit_denial(id, actor, action.name(), deny).await),
            Ok(_) => {
                let txn = self.storage().begin_write()?;
                self.storage().remove_rental(&txn, id)?;
                txn.commit()
                    .map_err(|e| AppError::storage(e.to_string()))?;

                self.audit.record(id, actor, "draft_deleted", json!({})).await;
                Ok(())
            }
        }
    }
}
