//! Vehicle rental snapshot

use super::payment::PaymentState;
use crate::util::now_millis;
use serde::{Deserialize, Serialize};

/// Rental lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Draft,
    Submitted,
    Approved,
    Denied,
    AwaitingPayment,
    Active,
    PickupConfirmed,
    Completed,
    DepositResolved,
}

impl RentalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Denied | Self::DepositResolved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Active => "active",
            Self::PickupConfirmed => "pickup_confirmed",
            Self::Completed => "completed",
            Self::DepositResolved => "deposit_resolved",
        }
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity verification outcome for the renter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Approved,
    Denied,
}

/// Declared purpose of the rental, constrained to a fixed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalPurpose {
    Personal,
    Business,
    Moving,
    Event,
}

impl RentalPurpose {
    /// Parse a client-supplied purpose string; None means not allowed
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "personal" => Some(Self::Personal),
            "business" => Some(Self::Business),
            "moving" => Some(Self::Moving),
            "event" => Some(Self::Event),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Business => "business",
            Self::Moving => "moving",
            Self::Event => "event",
        }
    }
}

/// Deposit settlement state after return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DepositRefundStatus {
    #[default]
    None,
    Pending,
    Refunded,
    Withheld,
}

/// Versioned snapshot of a vehicle rental
///
/// Same CAS discipline as deliveries: `version` must match at write
/// time or the transition is retried and ultimately rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalSnapshot {
    pub id: String,
    pub version: u64,
    pub status: RentalStatus,
    pub owner_id: String,

    // === Application ===
    /// All required documents uploaded
    pub docs_complete: bool,
    pub verification_status: VerificationStatus,
    /// Reason recorded when an admin denies the application
    pub denial_reason: Option<String>,
    pub agreement_signed: bool,
    pub purpose: Option<RentalPurpose>,

    // === Payment ===
    pub payment_intent_ref: Option<String>,
    pub payment_state: PaymentState,
    pub paid: bool,
    pub rent_cents: i64,
    pub deposit_cents: i64,
    pub currency: String,

    // === Fulfilment ===
    pub lockbox_released_at: Option<i64>,
    pub pickup_confirmed_at: Option<i64>,
    pub return_confirmed_at: Option<i64>,

    // === Deposit settlement ===
    pub deposit_refund_status: DepositRefundStatus,
    pub deposit_withheld_cents: Option<i64>,
    pub deposit_withheld_reason: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl RentalSnapshot {
    pub fn new_draft(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        rent_cents: i64,
        deposit_cents: i64,
        currency: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            version: 0,
            status: RentalStatus::Draft,
            owner_id: owner_id.into(),
            docs_complete: false,
            verification_status: VerificationStatus::Pending,
            denial_reason: None,
            agreement_signed: false,
            purpose: None,
            payment_intent_ref: None,
            payment_state: PaymentState::None,
            paid: false,
            rent_cents,
            deposit_cents,
            currency: currency.into(),
            lockbox_released_at: None,
            pickup_confirmed_at: None,
            return_confirmed_at: None,
            deposit_refund_status: DepositRefundStatus::None,
            deposit_withheld_cents: None,
            deposit_withheld_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total amount charged at agreement signing (rent plus deposit)
    pub fn total_cents(&self) -> i64 {
        self.rent_cents + self.deposit_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_draft() {
        let r = RentalSnapshot::new_draft("rnt-1", "cust-1", 10_000, 5_000, "eur");
        assert_eq!(r.status, RentalStatus::Draft);
        assert_eq!(r.verification_status, VerificationStatus::Pending);
        assert!(!r.docs_complete);
        assert!(!r.paid);
        assert_eq!(r.total_cents(), 15_000);
    }

    #[test]
    fn test_purpose_parse() {
        assert_eq!(RentalPurpose::parse("moving"), Some(RentalPurpose::Moving));
        assert_eq!(RentalPurpose::parse("joyride"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(RentalStatus::Denied.is_terminal());
        assert!(RentalStatus::DepositResolved.is_terminal());
        assert!(!RentalStatus::Active.is_terminal());
    }
}
