//! Delivery transition rules

use serde_json::json;
use shared::{Actor, ActorRole, DeliverySnapshot, DeliveryStatus, ErrorCode};

use super::{require_admin, require_owner, require_owner_or_admin, require_system, Deny, Gate, GateResult};

/// Requested delivery transition, carrying its action-specific fields
#[derive(Debug, Clone)]
pub enum DeliveryAction<'a> {
    /// Owner checkout: place the payment hold, draft → authorized
    Checkout,
    /// Webhook: authorization confirmed, authorized → awaiting_pickup_photo
    ConfirmAuthorization,
    /// Photo-store callback: pickup photo recorded → ready_for_dispatch
    RecordPickupPhoto,
    /// Admin assigns (or reassigns) a driver
    AssignDriver { driver_id: &'a str },
    /// Assigned driver starts the run
    StartTransit,
    /// Complete the delivery; captures the payment
    Complete,
    /// Owner or admin cancels with a reason
    Cancel { reason: &'a str },
    /// Owner deletes a draft that never left draft
    DeleteDraft,
}

impl DeliveryAction<'_> {
    /// Action name used in audit event types (`<name>` / `<name>_denied`)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::ConfirmAuthorization => "authorization_confirmed",
            Self::RecordPickupPhoto => "pickup_photo_recorded",
            Self::AssignDriver { .. } => "assign",
            Self::StartTransit => "start",
            Self::Complete => "complete",
            Self::Cancel { .. } => "cancel",
            Self::DeleteDraft => "delete_draft",
        }
    }
}

/// Collaborator facts gathered before evaluation so the gate itself
/// performs no I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliveryFacts {
    pub dropoff_photo: bool,
}

/// Decide whether `actor` may apply `action` to the delivery in the
/// state described by `snapshot`.
pub fn evaluate_delivery(
    snapshot: &DeliverySnapshot,
    action: &DeliveryAction<'_>,
    actor: &Actor,
    facts: &DeliveryFacts,
) -> GateResult {
    use DeliveryStatus::*;

    match action {
        DeliveryAction::Checkout => {
            require_owner(actor, &snapshot.owner_id)?;
            match snapshot.status {
                Draft => Ok(Gate::Proceed),
                // Retried checkout after the hold was placed
                Authorized => Ok(Gate::Noop),
                _ => Err(invalid_state(snapshot)),
            }
        }

        DeliveryAction::ConfirmAuthorization => {
            require_system(actor)?;
            match snapshot.status {
                Authorized => Ok(Gate::Proceed),
                // Late or replayed confirmation after the machine moved on
                AwaitingPickupPhoto | ReadyForDispatch | Assigned | InTransit | Completed => {
                    Ok(Gate::Noop)
                }
                _ => Err(invalid_state(snapshot)),
            }
        }

        DeliveryAction::RecordPickupPhoto => {
            require_system(actor)?;
            match snapshot.status {
                Authorized | AwaitingPickupPhoto => Ok(Gate::Proceed),
                ReadyForDispatch | Assigned | InTransit | Completed => Ok(Gate::Noop),
                _ => Err(invalid_state(snapshot)),
            }
        }

        DeliveryAction::AssignDriver { .. } => {
            require_admin(actor)?;
            match snapshot.status {
                // Reassignment overwrites the assignee and is allowed
                ReadyForDispatch | Assigned => Ok(Gate::Proceed),
                _ => Err(invalid_state(snapshot)),
            }
        }

        DeliveryAction::StartTransit => {
            if actor.role != ActorRole::Driver {
                return Err(Deny::new(ErrorCode::PermissionDenied));
            }
            if snapshot.status != Assigned {
                return Err(invalid_state(snapshot));
            }
            match &snapshot.assignee_id {
                Some(assignee) if actor.is(assignee) => Ok(Gate::Proceed),
                _ => Err(Deny::new(ErrorCode::NotAssignee)),
            }
        }

        DeliveryAction::Complete => {
            match actor.role {
                ActorRole::Admin => {}
                ActorRole::Driver => match &snapshot.assignee_id {
                    Some(assignee) if actor.is(assignee) => {}
                    _ => return Err(Deny::new(ErrorCode::NotAssignee)),
                },
                _ => return Err(Deny::new(ErrorCode::PermissionDenied)),
            }
            match snapshot.status {
                Completed => Ok(Gate::Noop),
                InTransit => {
                    if facts.dropoff_photo {
                        Ok(Gate::Proceed)
                    } else {
                        Err(Deny::with_detail(
                            ErrorCode::MissingProof,
                            json!({"required": "dropoff_photo"}),
                        ))
                    }
                }
                _ => Err(invalid_state(snapshot)),
            }
        }

        DeliveryAction::Cancel { reason } => {
            require_owner_or_admin(actor, &snapshot.owner_id)?;
            match snapshot.status {
                Cancelled => Ok(Gate::Noop),
                Completed => Err(invalid_state(snapshot)),
                _ => {
                    if reason.trim().is_empty() {
                        Err(Deny::new(ErrorCode::MissingReason))
                    } else {
                        Ok(Gate::Proceed)
                    }
                }
            }
        }

        DeliveryAction::DeleteDraft => {
            require_owner(actor, &snapshot.owner_id)?;
            if snapshot.status != Draft {
                return Err(Deny::new(ErrorCode::NotDraft));
            }
            Ok(Gate::Proceed)
        }
    }
}

fn invalid_state(snapshot: &DeliverySnapshot) -> Deny {
    Deny::with_detail(
        ErrorCode::InvalidState,
        json!({"status": snapshot.status.as_str()}),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DeliverySnapshot {
        DeliverySnapshot::new_draft("dlv-1", "cust-1", 500, "eur")
    }

    fn in_state(status: DeliveryStatus) -> DeliverySnapshot {
        let mut d = draft();
        d.status = status;
        d
    }

    #[test]
    fn test_checkout_owner_only() {
        let snap = draft();
        let facts = DeliveryFacts::default();

        let ok = evaluate_delivery(&snap, &DeliveryAction::Checkout, &Actor::customer("cust-1"), &facts);
        assert_eq!(ok, Ok(Gate::Proceed));

        let other = evaluate_delivery(&snap, &DeliveryAction::Checkout, &Actor::customer("cust-2"), &facts);
        assert_eq!(other.unwrap_err().code, ErrorCode::NotOwner);

        let driver = evaluate_delivery(&snap, &DeliveryAction::Checkout, &Actor::driver("drv-1"), &facts);
        assert_eq!(driver.unwrap_err().code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn test_checkout_retry_is_noop() {
        let snap = in_state(DeliveryStatus::Authorized);
        let result = evaluate_delivery(
            &snap,
            &DeliveryAction::Checkout,
            &Actor::customer("cust-1"),
            &DeliveryFacts::default(),
        );
        assert_eq!(result, Ok(Gate::Noop));
    }

    #[test]
    fn test_assign_requires_admin_and_dispatchable_state() {
        let facts = DeliveryFacts::default();
        let action = DeliveryAction::AssignDriver { driver_id: "drv-1" };

        let snap = in_state(DeliveryStatus::ReadyForDispatch);
        assert_eq!(
            evaluate_delivery(&snap, &action, &Actor::admin("adm-1"), &facts),
            Ok(Gate::Proceed)
        );
        assert_eq!(
            evaluate_delivery(&snap, &action, &Actor::customer("cust-1"), &facts)
                .unwrap_err()
                .code,
            ErrorCode::PermissionDenied
        );

        // Reassignment from assigned is allowed
        let mut assigned = in_state(DeliveryStatus::Assigned);
        assigned.assignee_id = Some("drv-9".into());
        assert_eq!(
            evaluate_delivery(&assigned, &action, &Actor::admin("adm-1"), &facts),
            Ok(Gate::Proceed)
        );

        let early = in_state(DeliveryStatus::Draft);
        assert_eq!(
            evaluate_delivery(&early, &action, &Actor::admin("adm-1"), &facts)
                .unwrap_err()
                .code,
            ErrorCode::InvalidState
        );
    }

    #[test]
    fn test_start_transit_only_by_assignee() {
        let facts = DeliveryFacts::default();
        let mut snap = in_state(DeliveryStatus::Assigned);
        snap.assignee_id = Some("drv-1".into());

        assert_eq!(
            evaluate_delivery(&snap, &DeliveryAction::StartTransit, &Actor::driver("drv-1"), &facts),
            Ok(Gate::Proceed)
        );
        assert_eq!(
            evaluate_delivery(&snap, &DeliveryAction::StartTransit, &Actor::driver("drv-2"), &facts)
                .unwrap_err()
                .code,
            ErrorCode::NotAssignee
        );
    }

    #[test]
    fn test_complete_requires_dropoff_photo() {
        let mut snap = in_state(DeliveryStatus::InTransit);
        snap.assignee_id = Some("drv-1".into());
        let driver = Actor::driver("drv-1");

        let missing = evaluate_delivery(
            &snap,
            &DeliveryAction::Complete,
            &driver,
            &DeliveryFacts { dropoff_photo: false },
        );
        assert_eq!(missing.unwrap_err().code, ErrorCode::MissingProof);

        let present = evaluate_delivery(
            &snap,
            &DeliveryAction::Complete,
            &driver,
            &DeliveryFacts { dropoff_photo: true },
        );
        assert_eq!(present, Ok(Gate::Proceed));
    }

    #[test]
    fn test_recomplete_is_noop_regardless_of_photo() {
        let mut snap = in_state(DeliveryStatus::Completed);
        snap.assignee_id = Some("drv-1".into());
        let result = evaluate_delivery(
            &snap,
            &DeliveryAction::Complete,
            &Actor::driver("drv-1"),
            &DeliveryFacts { dropoff_photo: false },
        );
        assert_eq!(result, Ok(Gate::Noop));
    }

    #[test]
    fn test_cancel_rules() {
        let facts = DeliveryFacts::default();
        let snap = in_state(DeliveryStatus::Assigned);

        // Owner and admin may cancel with a reason
        assert_eq!(
            evaluate_delivery(
                &snap,
                &DeliveryAction::Cancel { reason: "changed plans" },
                &Actor::customer("cust-1"),
                &facts
            ),
            Ok(Gate::Proceed)
        );
        assert_eq!(
            evaluate_delivery(
                &snap,
                &DeliveryAction::Cancel { reason: "fraud" },
                &Actor::admin("adm-1"),
                &facts
            ),
            Ok(Gate::Proceed)
        );

        // A blank reason is rejected
        assert_eq!(
            evaluate_delivery(
                &snap,
                &DeliveryAction::Cancel { reason: "  " },
                &Actor::customer("cust-1"),
                &facts
            )
            .unwrap_err()
            .code,
            ErrorCode::MissingReason
        );

        // Completed deliveries cannot be cancelled
        let done = in_state(DeliveryStatus::Completed);
        assert_eq!(
            evaluate_delivery(
                &done,
                &DeliveryAction::Cancel { reason: "late" },
                &Actor::admin("adm-1"),
                &facts
            )
            .unwrap_err()
            .code,
            ErrorCode::InvalidState
        );

        // Cancelling twice is a no-op
        let gone = in_state(DeliveryStatus::Cancelled);
        assert_eq!(
            evaluate_delivery(
                &gone,
                &DeliveryAction::Cancel { reason: "again" },
                &Actor::customer("cust-1"),
                &facts
            ),
            Ok(Gate::Noop)
        );
    }

    #[test]
    fn test_delete_draft_rules() {
        let facts = DeliveryFacts::default();
        let snap = draft();

        assert_eq!(
            evaluate_delivery(&snap, &DeliveryAction::DeleteDraft, &Actor::customer("cust-1"), &facts),
            Ok(Gate::Proceed)
        );
        assert_eq!(
            evaluate_delivery(&snap, &DeliveryAction::DeleteDraft, &Actor::customer("cust-2"), &facts)
                .unwrap_err()
                .code,
            ErrorCode::NotOwner
        );

        let advanced = in_state(DeliveryStatus::Authorized);
        assert_eq!(
            evaluate_delivery(&advanced, &DeliveryAction::DeleteDraft, &Actor::customer("cust-1"), &facts)
                .unwrap_err()
                .code,
            ErrorCode::NotDraft
        );
    }

    #[test]
    fn test_webhook_actions_require_system_actor() {
        let facts = DeliveryFacts::default();
        let snap = in_state(DeliveryStatus::Authorized);
        assert_eq!(
            evaluate_delivery(&snap, &DeliveryAction::ConfirmAuthorization, &Actor::admin("adm-1"), &facts)
                .unwrap_err()
                .code,
            ErrorCode::PermissionDenied
        );
        assert_eq!(
            evaluate_delivery(&snap, &DeliveryAction::ConfirmAuthorization, &Actor::system(), &facts),
            Ok(Gate::Proceed)
        );
    }
}
