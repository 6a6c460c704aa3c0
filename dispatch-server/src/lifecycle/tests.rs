//! End-to-end lifecycle scenarios against in-memory storage and the
//! mock payment provider.

use std::sync::Arc;

use shared::{Actor, DeliveryStatus, ErrorCode, PaymentState, RentalStatus};

use crate::audit::AuditService;
use crate::collaborators::{InMemoryPhotoStore, LoggingNotifier, PhotoPhase, RecordingNotifier};
use crate::lifecycle::authority::{ReviewDecision, WebhookEvent, WebhookOutcome};
use crate::lifecycle::gate::DepositDecision;
use crate::lifecycle::{LifecycleAuthority, LifecycleStorage};
use crate::payments::{MockProvider, PaymentOrchestrator};

struct Harness {
    authority: Arc<LifecycleAuthority>,
    provider: Arc<MockProvider>,
    photos: Arc<InMemoryPhotoStore>,
    notifier: Arc<RecordingNotifier>,
    audit: Arc<AuditService>,
}

fn harness() -> Harness {
    let storage = LifecycleStorage::open_in_memory().unwrap();
    let provider = Arc::new(MockProvider::new());
    let orchestrator = PaymentOrchestrator::new(provider.clone());
    let (audit, _retry_rx) = AuditService::new(storage.clone(), 64);
    let photos = Arc::new(InMemoryPhotoStore::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let authority = Arc::new(LifecycleAuthority::new(
        storage,
        orchestrator,
        audit.clone(),
        photos.clone(),
        notifier.clone(),
    ));

    Harness {
        authority,
        provider,
        photos,
        notifier,
        audit,
    }
}

fn event_types(h: &Harness, id: &str) -> Vec<String> {
    h.audit
        .events_for(id)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

/// Create a delivery and drive it to `in_transit` with the dropoff
/// photo already on file.
async fn delivery_in_transit(h: &Harness, owner: &Actor, driver: &Actor) -> String {
    let admin = Actor::admin("ops");
    let d = h.authority.create_delivery(owner, 500, "EUR").await.unwrap();
    h.authority.checkout_delivery(owner, &d.id).await.unwrap();
    h.authority.record_pickup_photo(&d.id).await.unwrap();
    h.authority
        .assign_driver(&admin, &d.id, driver.id.as_deref().unwrap())
        .await
        .unwrap();
    h.authority.start_transit(driver, &d.id).await.unwrap();
    h.photos.put_photo(&d.id, PhotoPhase::Dropoff);
    d.id
}

// ========== Delivery scenarios ==========

#[tokio::test]
async fn delivery_happy_path_authorizes_then_captures_once() {
    let h = harness();
    let owner = Actor::customer("c1");
    let driver = Actor::driver("d1");

    let id = delivery_in_transit(&h, &owner, &driver).await;
    let done = h.authority.complete_delivery(&driver, &id).await.unwrap();

    assert_eq!(done.status, DeliveryStatus::Completed);
    assert_eq!(done.payment_state, PaymentState::Captured);
    assert_eq!(done.amount_cents, 500);
    assert_eq!(h.provider.authorize_calls(), 1);
    assert_eq!(h.provider.capture_calls(), 1);
    assert_eq!(h.provider.void_calls(), 0);

    let types = event_types(&h, &id);
    for expected in [
        "created",
        "checkout",
        "pickup_photo_recorded",
        "driver_assigned",
        "transit_started",
        "completed",
    ] {
        assert!(types.iter().any(|t| t == expected), "missing {expected}");
    }

    let sent = h.notifier.sent();
    assert!(sent.iter().any(|n| n.template == "delivery_assigned"));
    assert!(sent.iter().any(|n| n.template == "delivery_completed"));
}

#[tokio::test]
async fn checkout_retry_reuses_existing_hold() {
    let h = harness();
    let owner = Actor::customer("c1");
    let d = h.authority.create_delivery(&owner, 800, "EUR").await.unwrap();

    let first = h.authority.checkout_delivery(&owner, &d.id).await.unwrap();
    let second = h.authority.checkout_delivery(&owner, &d.id).await.unwrap();

    assert_eq!(h.provider.authorize_calls(), 1);
    assert_eq!(first.payment_intent_ref, second.payment_intent_ref);
    assert_eq!(second.version, first.version);
    assert_eq!(second.status, DeliveryStatus::Authorized);
}

#[tokio::test]
async fn checkout_below_minimum_charge_is_rejected() {
    let h = harness();
    let owner = Actor::customer("c1");
    let d = h.authority.create_delivery(&owner, 20, "EUR").await.unwrap();

    let err = h.authority.checkout_delivery(&owner, &d.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidAmount);
    assert_eq!(h.provider.authorize_calls(), 0);

    let unchanged = h.authority.get_delivery(&d.id).unwrap();
    assert_eq!(unchanged.status, DeliveryStatus::Draft);
    assert_eq!(unchanged.payment_state, PaymentState::None);
}

#[tokio::test]
async fn complete_requires_dropoff_photo() {
    let h = harness();
    let owner = Actor::customer("c1");
    let driver = Actor::driver("d1");
    let admin = Actor::admin("ops");

    let d = h.authority.create_delivery(&owner, 500, "EUR").await.unwrap();
    h.authority.checkout_delivery(&owner, &d.id).await.unwrap();
    h.authority.record_pickup_photo(&d.id).await.unwrap();
    h.authority.assign_driver(&admin, &d.id, "d1").await.unwrap();
    h.authority.start_transit(&driver, &d.id).await.unwrap();

    let err = h.authority.complete_delivery(&driver, &d.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingProof);
    assert_eq!(h.provider.capture_calls(), 0);
    assert!(event_types(&h, &d.id).iter().any(|t| t == "complete_denied"));

    h.photos.put_photo(&d.id, PhotoPhase::Dropoff);
    let done = h.authority.complete_delivery(&driver, &d.id).await.unwrap();
    assert_eq!(done.status, DeliveryStatus::Completed);
}

#[tokio::test]
async fn concurrent_completes_capture_exactly_once() {
    let h = harness();
    let owner = Actor::customer("c1");
    let driver = Actor::driver("d1");
    let id = delivery_in_transit(&h, &owner, &driver).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let authority = h.authority.clone();
        let driver = driver.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            authority.complete_delivery(&driver, &id).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.provider.capture_calls(), 1);
    let snapshot = h.authority.get_delivery(&id).unwrap();
    assert_eq!(snapshot.status, DeliveryStatus::Completed);
    assert_eq!(snapshot.payment_state, PaymentState::Captured);

    let captures = event_types(&h, &id)
        .iter()
        .filter(|t| *t == "completed")
        .count();
    assert!(captures >= 1);
}

#[tokio::test]
async fn concurrent_reassignments_both_audited_single_final_assignee() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");

    let d = h.authority.create_delivery(&owner, 500, "EUR").await.unwrap();
    h.authority.checkout_delivery(&owner, &d.id).await.unwrap();
    h.authority.record_pickup_photo(&d.id).await.unwrap();

    let a = {
        let authority = h.authority.clone();
        let admin = admin.clone();
        let id = d.id.clone();
        tokio::spawn(async move { authority.assign_driver(&admin, &id, "d1").await })
    };
    let b = {
        let authority = h.authority.clone();
        let admin = admin.clone();
        let id = d.id.clone();
        tokio::spawn(async move { authority.assign_driver(&admin, &id, "d2").await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let snapshot = h.authority.get_delivery(&d.id).unwrap();
    let final_assignee = snapshot.assignee_id.clone().unwrap();
    assert!(final_assignee == "d1" || final_assignee == "d2");

    let assignments = event_types(&h, &d.id)
        .iter()
        .filter(|t| *t == "driver_assigned" || *t == "driver_reassigned")
        .count();
    assert_eq!(assignments, 2);
}

#[tokio::test]
async fn cancel_voids_hold_before_terminal_state() {
    let h = harness();
    let owner = Actor::customer("c1");
    let d = h.authority.create_delivery(&owner, 500, "EUR").await.unwrap();
    h.authority.checkout_delivery(&owner, &d.id).await.unwrap();

    let cancelled = h
        .authority
        .cancel_delivery(&owner, &d.id, "changed my mind")
        .await
        .unwrap();
    assert_eq!(cancelled.status, DeliveryStatus::Cancelled);
    assert_eq!(cancelled.payment_state, PaymentState::Voided);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("changed my mind"));
    assert_eq!(h.provider.void_calls(), 1);

    // Retried cancel is a no-op, the provider is not called again
    let again = h
        .authority
        .cancel_delivery(&owner, &d.id, "changed my mind")
        .await
        .unwrap();
    assert_eq!(again.version, cancelled.version);
    assert_eq!(h.provider.void_calls(), 1);
}

#[tokio::test]
async fn completed_delivery_cannot_be_cancelled() {
    let h = harness();
    let owner = Actor::customer("c1");
    let driver = Actor::driver("d1");
    let id = delivery_in_transit(&h, &owner, &driver).await;
    h.authority.complete_delivery(&driver, &id).await.unwrap();

    let err = h
        .authority
        .cancel_delivery(&owner, &id, "too late")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);
    assert!(event_types(&h, &id).iter().any(|t| t == "cancel_denied"));
}

#[tokio::test]
async fn provider_outage_leaves_state_retryable() {
    let h = harness();
    let owner = Actor::customer("c1");
    let driver = Actor::driver("d1");
    let id = delivery_in_transit(&h, &owner, &driver).await;

    h.provider.set_fail_capture(true);
    let err = h.authority.complete_delivery(&driver, &id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentProviderError);
    assert!(err.is_retryable());

    let snapshot = h.authority.get_delivery(&id).unwrap();
    assert_eq!(snapshot.status, DeliveryStatus::InTransit);
    assert_eq!(snapshot.payment_state, PaymentState::Authorized);
    assert!(event_types(&h, &id).iter().any(|t| t == "complete_failed"));

    h.provider.set_fail_capture(false);
    let done = h.authority.complete_delivery(&driver, &id).await.unwrap();
    assert_eq!(done.payment_state, PaymentState::Captured);
}

#[tokio::test]
async fn draft_deletion_keeps_the_event_trail() {
    let h = harness();
    let owner = Actor::customer("c1");
    let d = h.authority.create_delivery(&owner, 500, "EUR").await.unwrap();
    h.authority.delete_draft_delivery(&owner, &d.id).await.unwrap();

    let err = h.authority.get_delivery(&d.id).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let types = event_types(&h, &d.id);
    assert!(types.iter().any(|t| t == "created"));
    assert!(types.iter().any(|t| t == "draft_deleted"));
}

#[tokio::test]
async fn stranger_actions_are_denied_and_audited() {
    let h = harness();
    let owner = Actor::customer("c1");
    let stranger = Actor::customer("c2");
    let d = h.authority.create_delivery(&owner, 500, "EUR").await.unwrap();

    let err = h.authority.checkout_delivery(&stranger, &d.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotOwner);
    assert!(event_types(&h, &d.id).iter().any(|t| t == "checkout_denied"));
}

// ========== Webhook scenarios ==========

#[tokio::test]
async fn webhook_replay_is_applied_exactly_once() {
    let h = harness();
    let owner = Actor::customer("c1");
    let d = h.authority.create_delivery(&owner, 500, "EUR").await.unwrap();
    let authorized = h.authority.checkout_delivery(&owner, &d.id).await.unwrap();

    let event = WebhookEvent {
        intent_ref: authorized.payment_intent_ref.clone().unwrap(),
        outcome: WebhookOutcome::AuthorizationConfirmed,
        raw_event_id: "evt_001".into(),
    };
    h.authority.reconcile(&event).await.unwrap();
    h.authority.reconcile(&event).await.unwrap();

    let snapshot = h.authority.get_delivery(&d.id).unwrap();
    assert_eq!(snapshot.status, DeliveryStatus::AwaitingPickupPhoto);
    assert_eq!(snapshot.version, authorized.version + 1);

    let confirmations = event_types(&h, &d.id)
        .iter()
        .filter(|t| *t == "authorization_confirmed")
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn webhook_for_unknown_intent_is_acknowledged() {
    let h = harness();
    let event = WebhookEvent {
        intent_ref: "pi_missing".into(),
        outcome: WebhookOutcome::Captured,
        raw_event_id: "evt_404".into(),
    };
    h.authority.reconcile(&event).await.unwrap();
}

#[tokio::test]
async fn out_of_sequence_webhook_is_dropped_without_state_change() {
    let h = harness();
    let owner = Actor::customer("c1");
    let driver = Actor::driver("d1");
    let id = delivery_in_transit(&h, &owner, &driver).await;
    let done = h.authority.complete_delivery(&driver, &id).await.unwrap();

    // A late authorization confirmation after completion is a no-op
    let event = WebhookEvent {
        intent_ref: done.payment_intent_ref.clone().unwrap(),
        outcome: WebhookOutcome::AuthorizationConfirmed,
        raw_event_id: "evt_late".into(),
    };
    h.authority.reconcile(&event).await.unwrap();

    let snapshot = h.authority.get_delivery(&id).unwrap();
    assert_eq!(snapshot.status, DeliveryStatus::Completed);
    assert_eq!(snapshot.version, done.version);
}

// ========== Rental scenarios ==========

async fn rental_awaiting_payment(h: &Harness, owner: &Actor) -> shared::RentalSnapshot {
    let admin = Actor::admin("ops");
    let r = h
        .authority
        .create_rental(owner, 10_000, 5_000, "EUR", true)
        .await
        .unwrap();
    h.authority.submit_rental(owner, &r.id).await.unwrap();
    h.authority
        .review_rental(&admin, &r.id, ReviewDecision::Approve, None)
        .await
        .unwrap();
    h.authority
        .sign_agreement(owner, &r.id, "personal")
        .await
        .unwrap()
}

async fn rental_active(h: &Harness, owner: &Actor) -> shared::RentalSnapshot {
    let signed = rental_awaiting_payment(h, owner).await;
    let event = WebhookEvent {
        intent_ref: signed.payment_intent_ref.clone().unwrap(),
        outcome: WebhookOutcome::Captured,
        raw_event_id: format!("evt_pay_{}", signed.id),
    };
    h.authority.reconcile(&event).await.unwrap();
    h.authority.get_rental(&signed.id).unwrap()
}

#[tokio::test]
async fn sign_requires_approved_verification_then_succeeds() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");

    let r = h
        .authority
        .create_rental(&owner, 10_000, 5_000, "EUR", true)
        .await
        .unwrap();
    h.authority.submit_rental(&owner, &r.id).await.unwrap();

    let err = h
        .authority
        .sign_agreement(&owner, &r.id, "personal")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::VerificationRequired);
    assert!(event_types(&h, &r.id).iter().any(|t| t == "sign_denied"));
    assert_eq!(h.provider.authorize_calls(), 0);

    h.authority
        .review_rental(&admin, &r.id, ReviewDecision::Approve, None)
        .await
        .unwrap();
    let signed = h
        .authority
        .sign_agreement(&owner, &r.id, "personal")
        .await
        .unwrap();

    assert_eq!(signed.status, RentalStatus::AwaitingPayment);
    assert!(signed.agreement_signed);
    assert_eq!(signed.payment_state, PaymentState::Authorized);
    // The hold covers rent plus deposit
    assert_eq!(h.provider.authorize_calls(), 1);
}

#[tokio::test]
async fn unknown_purpose_is_rejected_at_signing() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");

    let r = h
        .authority
        .create_rental(&owner, 10_000, 0, "EUR", true)
        .await
        .unwrap();
    h.authority.submit_rental(&owner, &r.id).await.unwrap();
    h.authority
        .review_rental(&admin, &r.id, ReviewDecision::Approve, None)
        .await
        .unwrap();

    let err = h
        .authority
        .sign_agreement(&owner, &r.id, "joyride")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidPurpose);
}

#[tokio::test]
async fn denial_requires_reason_and_is_terminal() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");

    let r = h
        .authority
        .create_rental(&owner, 10_000, 0, "EUR", true)
        .await
        .unwrap();
    h.authority.submit_rental(&owner, &r.id).await.unwrap();

    let err = h
        .authority
        .review_rental(&admin, &r.id, ReviewDecision::Deny, None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingReason);

    let denied = h
        .authority
        .review_rental(&admin, &r.id, ReviewDecision::Deny, Some("incomplete docs"))
        .await
        .unwrap();
    assert_eq!(denied.status, RentalStatus::Denied);

    let err = h.authority.submit_rental(&owner, &r.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidState);
}

#[tokio::test]
async fn payment_webhook_activates_rental_once() {
    let h = harness();
    let owner = Actor::customer("c1");
    let signed = rental_awaiting_payment(&h, &owner).await;

    let event = WebhookEvent {
        intent_ref: signed.payment_intent_ref.clone().unwrap(),
        outcome: WebhookOutcome::Captured,
        raw_event_id: "evt_pay_1".into(),
    };
    h.authority.reconcile(&event).await.unwrap();
    h.authority.reconcile(&event).await.unwrap();

    let snapshot = h.authority.get_rental(&signed.id).unwrap();
    assert_eq!(snapshot.status, RentalStatus::Active);
    assert!(snapshot.paid);
    assert_eq!(snapshot.payment_state, PaymentState::Captured);
    assert_eq!(snapshot.version, signed.version + 1);

    let payments = event_types(&h, &signed.id)
        .iter()
        .filter(|t| *t == "payment_completed")
        .count();
    assert_eq!(payments, 1);
}

#[tokio::test]
async fn pickup_blocked_until_lockbox_released() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");
    let active = rental_active(&h, &owner).await;

    let err = h.authority.confirm_pickup(&owner, &active.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::PickupNotAllowed);
    let unmet = err
        .details
        .as_ref()
        .and_then(|d| d.get("unmet"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap();
    assert!(unmet.iter().any(|v| v == "lockbox_released"));

    h.authority.release_lockbox(&admin, &active.id).await.unwrap();
    let picked = h.authority.confirm_pickup(&owner, &active.id).await.unwrap();
    assert_eq!(picked.status, RentalStatus::PickupConfirmed);
    assert!(picked.pickup_confirmed_at.is_some());
}

#[tokio::test]
async fn lockbox_release_requires_payment() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");
    let signed = rental_awaiting_payment(&h, &owner).await;

    let err = h.authority.release_lockbox(&admin, &signed.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NotPaid);
    assert!(event_types(&h, &signed.id)
        .iter()
        .any(|t| t == "lockbox_release_denied"));
}

#[tokio::test]
async fn deposit_resolution_is_terminal() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");
    let active = rental_active(&h, &owner).await;

    h.authority.release_lockbox(&admin, &active.id).await.unwrap();
    h.authority.confirm_pickup(&owner, &active.id).await.unwrap();
    let returned = h.authority.confirm_return(&admin, &active.id).await.unwrap();
    assert_eq!(returned.status, RentalStatus::Completed);
    assert_eq!(
        returned.deposit_refund_status,
        shared::DepositRefundStatus::Pending
    );

    let resolved = h
        .authority
        .resolve_deposit(&admin, &active.id, DepositDecision::Refunded, None, None)
        .await
        .unwrap();
    assert_eq!(resolved.status, RentalStatus::DepositResolved);
    assert_eq!(
        resolved.deposit_refund_status,
        shared::DepositRefundStatus::Refunded
    );

    let err = h
        .authority
        .resolve_deposit(
            &admin,
            &active.id,
            DepositDecision::Withheld,
            Some("damage"),
            Some(2_000),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::AlreadyResolved);
    assert!(event_types(&h, &active.id)
        .iter()
        .any(|t| t == "resolve_deposit_denied"));
}

#[tokio::test]
async fn withheld_deposit_requires_reason_and_amount() {
    let h = harness();
    let owner = Actor::customer("c1");
    let admin = Actor::admin("ops");
    let active = rental_active(&h, &owner).await;

    h.authority.release_lockbox(&admin, &active.id).await.unwrap();
    h.authority.confirm_pickup(&owner, &active.id).await.unwrap();
    h.authority.confirm_return(&admin, &active.id).await.unwrap();

    let err = h
        .authority
        .resolve_deposit(&admin, &active.id, DepositDecision::Withheld, None, Some(500))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingReason);

    let resolved = h
        .authority
        .resolve_deposit(
            &admin,
            &active.id,
            DepositDecision::Withheld,
            Some("scratched panel"),
            Some(2_000),
        )
        .await
        .unwrap();
    assert_eq!(
        resolved.deposit_refund_status,
        shared::DepositRefundStatus::Withheld
    );
    assert_eq!(resolved.deposit_withheld_cents, Some(2_000));
    assert_eq!(resolved.deposit_withheld_reason.as_deref(), Some("scratched panel"));
}

#[tokio::test]
async fn resource_locks_are_released_after_each_unit_of_work() {
    let h = harness();
    let owner = Actor::customer("c1");
    let driver = Actor::driver("d1");

    let id = delivery_in_transit(&h, &owner, &driver).await;
    let done = h.authority.complete_delivery(&driver, &id).await.unwrap();
    assert_eq!(h.authority.held_locks(), 0);

    // Webhook path drops its lock entry too
    let event = WebhookEvent {
        intent_ref: done.payment_intent_ref.clone().unwrap(),
        outcome: WebhookOutcome::Captured,
        raw_event_id: "evt_lock".into(),
    };
    h.authority.reconcile(&event).await.unwrap();
    assert_eq!(h.authority.held_locks(), 0);
}

#[tokio::test]
async fn notifier_failures_never_block_transitions() {
    // LoggingNotifier only logs; the transition must still commit
    let storage = LifecycleStorage::open_in_memory().unwrap();
    let provider = Arc::new(MockProvider::new());
    let (audit, _rx) = AuditService::new(storage.clone(), 16);
    let authority = LifecycleAuthority::new(
        storage,
        PaymentOrchestrator::new(provider),
        audit,
        Arc::new(InMemoryPhotoStore::new()),
        Arc::new(LoggingNotifier),
    );

    let owner = Actor::customer("c1");
    let d = authority.create_delivery(&owner, 500, "EUR").await.unwrap();
    let authorized = authority.checkout_delivery(&owner, &d.id).await.unwrap();
    assert_eq!(authorized.status, DeliveryStatus::Authorized);
}
