//! Rental transition rules

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    Actor, DepositRefundStatus, ErrorCode, RentalPurpose, RentalSnapshot, RentalStatus,
    VerificationStatus,
};

use super::{require_admin, require_owner, require_system, Deny, Gate, GateResult};

/// Admin decision when settling the deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositDecision {
    Refunded,
    Withheld,
}

/// Requested rental transition
#[derive(Debug, Clone)]
pub enum RentalAction<'a> {
    /// Owner submits the application for review
    Submit,
    /// Admin approves the application (and the renter's verification)
    Approve,
    /// Admin denies the application with a reason
    DenyApplication { reason: &'a str },
    /// Owner signs the agreement, declaring a purpose; places the hold
    Sign { purpose: &'a str },
    /// Webhook: rent + deposit captured
    PaymentCompleted,
    /// Admin opens the lockbox once payment is in
    ReleaseLockbox,
    /// Owner confirms vehicle pickup
    ConfirmPickup,
    /// Admin confirms the vehicle came back
    ConfirmReturn,
    /// Admin settles the deposit
    ResolveDeposit {
        decision: DepositDecision,
        reason: Option<&'a str>,
        amount_cents: Option<i64>,
    },
    /// Owner deletes a draft that never left draft
    DeleteDraft,
}

impl RentalAction<'_> {
    /// Action name used in audit event types (`<name>` / `<name>_denied`)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve | Self::DenyApplication { .. } => "review",
            Self::Sign { .. } => "sign",
            Self::PaymentCompleted => "payment_completed",
            Self::ReleaseLockbox => "lockbox_release",
            Self::ConfirmPickup => "confirm_pickup",
            Self::ConfirmReturn => "confirm_return",
            Self::ResolveDeposit { .. } => "resolve_deposit",
            Self::DeleteDraft => "delete_draft",
        }
    }
}

/// Decide whether `actor` may apply `action` to the rental in the
/// state described by `snapshot`.
pub fn evaluate_rental(
    snapshot: &RentalSnapshot,
    action: &RentalAction<'_>,
    actor: &Actor,
) -> GateResult {
    use RentalStatus::*;

    match action {
        RentalAction::Submit => {
            require_owner(actor, &snapshot.owner_id)?;
            match snapshot.status {
                Draft => {
                    if snapshot.docs_complete {
                        Ok(Gate::Proceed)
                    } else {
                        Err(Deny::with_detail(
                            ErrorCode::InvalidState,
                            json!({"unmet": "docs_complete"}),
                        ))
                    }
                }
                Submitted => Ok(Gate::Noop),
                _ => Err(invalid_state(snapshot)),
            }
        }

        RentalAction::Approve => {
            require_admin(actor)?;
            match snapshot.status {
                Submitted => Ok(Gate::Proceed),
                Approved => Ok(Gate::Noop),
                _ => Err(invalid_state(snapshot)),
            }
        }

        RentalAction::DenyApplication { reason } => {
            require_admin(actor)?;
            match snapshot.status {
                Submitted => {
                    if reason.trim().is_empty() {
                        Err(Deny::new(ErrorCode::MissingReason))
                    } else {
                        Ok(Gate::Proceed)
                    }
                }
                Denied => Ok(Gate::Noop),
                _ => Err(invalid_state(snapshot)),
            }
        }

        RentalAction::Sign { purpose } => {
            require_owner(actor, &snapshot.owner_id)?;
            match snapshot.status {
                Submitted | Approved => {
                    if snapshot.verification_status != VerificationStatus::Approved {
                        return Err(Deny::new(ErrorCode::VerificationRequired));
                    }
                    if RentalPurpose::parse(purpose).is_none() {
                        return Err(Deny::with_detail(
                            ErrorCode::InvalidPurpose,
                            json!({"purpose": purpose}),
                        ));
                    }
                    Ok(Gate::Proceed)
                }
                AwaitingPayment if snapshot.agreement_signed => Ok(Gate::Noop),
                _ => Err(invalid_state(snapshot)),
            }
        }

        RentalAction::PaymentCompleted => {
            require_system(actor)?;
            if snapshot.paid {
                return Ok(Gate::Noop);
            }
            match snapshot.status {
                AwaitingPayment => Ok(Gate::Proceed),
                _ => Err(invalid_state(snapshot)),
            }
        }

        RentalAction::ReleaseLockbox => {
            require_admin(actor)?;
            if !snapshot.paid {
                return Err(Deny::new(ErrorCode::NotPaid));
            }
            if snapshot.lockbox_released_at.is_some() {
                return Ok(Gate::Noop);
            }
            Ok(Gate::Proceed)
        }

        RentalAction::ConfirmPickup => {
            require_owner(actor, &snapshot.owner_id)?;
            // Repeat confirmation succeeds without touching the timestamp
            if snapshot.pickup_confirmed_at.is_some() {
                return Ok(Gate::Noop);
            }
            // The flags below are only meaningful on an active rental;
            // checking the status too means flag drift can never walk
            // around the state machine
            if snapshot.status != Active {
                return Err(invalid_state(snapshot));
            }
            let mut unmet = Vec::new();
            if snapshot.verification_status != VerificationStatus::Approved {
                unmet.push("verification_approved");
            }
            if !snapshot.paid {
                unmet.push("paid");
            }
            if snapshot.lockbox_released_at.is_none() {
                unmet.push("lockbox_released");
            }
            if unmet.is_empty() {
                Ok(Gate::Proceed)
            } else {
                Err(Deny::with_detail(
                    ErrorCode::PickupNotAllowed,
                    json!({"unmet": unmet}),
                ))
            }
        }

        RentalAction::ConfirmReturn => {
            require_admin(actor)?;
            match snapshot.status {
                PickupConfirmed => Ok(Gate::Proceed),
                Completed => Ok(Gate::Noop),
                _ => Err(invalid_state(snapshot)),
            }
        }

        RentalAction::ResolveDeposit {
            decision,
            reason,
            amount_cents,
        } => {
            require_admin(actor)?;
            match snapshot.deposit_refund_status {
                DepositRefundStatus::Refunded | DepositRefundStatus::Withheld => {
                    return Err(Deny::new(ErrorCode::AlreadyResolved));
                }
                DepositRefundStatus::Pending => {}
                DepositRefundStatus::None => return Err(invalid_state(snapshot)),
            }
            if *decision == DepositDecision::Withheld {
                if reason.map_or(true, |r| r.trim().is_empty()) {
                    return Err(Deny::new(ErrorCode::MissingReason));
                }
                match amount_cents {
                    Some(amount) if *amount > 0 => {}
                    _ => return Err(Deny::new(ErrorCode::InvalidAmount)),
                }
            }
            Ok(Gate::Proceed)
        }

        RentalAction::DeleteDraft => {
            require_owner(actor, &snapshot.owner_id)?;
            if snapshot.status != Draft {
                return Err(Deny::new(ErrorCode::NotDraft));
            }
            Ok(Gate::Proceed)
        }
    }
}

fn invalid_state(snapshot: &RentalSnapshot) -> Deny {
    Deny::with_detail(
        ErrorCode::InvalidState,
        json!({"status": snapshot.status.as_str()}),
    )
}
