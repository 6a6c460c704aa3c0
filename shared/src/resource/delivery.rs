//! Delivery order snapshot

use super::payment::PaymentState;
use crate::util::now_millis;
use serde::{Deserialize, Serialize};

/// Delivery lifecycle status
///
/// `draft -> authorized -> awaiting_pickup_photo -> ready_for_dispatch
/// -> assigned -> in_transit -> completed`, with `cancelled` reachable
/// from any pre-`completed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Draft,
    Authorized,
    AwaitingPickupPhoto,
    ReadyForDispatch,
    Assigned,
    InTransit,
    Completed,
    Cancelled,
}

impl DeliveryStatus {
    /// Terminal statuses accept no further transitions except audit reads
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Authorized => "authorized",
            Self::AwaitingPickupPhoto => "awaiting_pickup_photo",
            Self::ReadyForDispatch => "ready_for_dispatch",
            Self::Assigned => "assigned",
            Self::InTransit => "in_transit",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Versioned snapshot of a delivery order
///
/// `version` is the compare-and-set token: every write through the
/// transition authority is conditional on the stored version matching
/// the one the decision was made against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub id: String,
    pub version: u64,
    pub status: DeliveryStatus,
    /// Customer who created the order; immutable after creation
    pub owner_id: String,
    /// Assigned driver; None until assignment
    pub assignee_id: Option<String>,

    // === Payment ===
    /// Opaque external payment reference
    pub payment_intent_ref: Option<String>,
    pub payment_state: PaymentState,
    /// Authorization amount in cents
    pub amount_cents: i64,
    pub currency: String,

    // === Cancellation ===
    pub cancelled_at: Option<i64>,
    pub cancel_reason: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl DeliverySnapshot {
    /// Create a fresh draft owned by `owner_id`
    pub fn new_draft(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        amount_cents: i64,
        currency: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            version: 0,
            status: DeliveryStatus::Draft,
            owner_id: owner_id.into(),
            assignee_id: None,
            payment_intent_ref: None,
            payment_state: PaymentState::None,
            amount_cents,
            currency: currency.into(),
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}
