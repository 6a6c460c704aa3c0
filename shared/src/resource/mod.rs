//! Resource models
//!
//! The platform coordinates two resource kinds: delivery orders and
//! vehicle rentals. Each is persisted as a versioned snapshot mutated
//! only through the transition authority; every transition attempt is
//! recorded as an immutable [`LifecycleEvent`].

pub mod delivery;
pub mod event;
pub mod payment;
pub mod rental;

pub use delivery::{DeliverySnapshot, DeliveryStatus};
pub use event::LifecycleEvent;
pub use payment::PaymentState;
pub use rental::{
    DepositRefundStatus, RentalPurpose, RentalSnapshot, RentalStatus, VerificationStatus,
};

use serde::{Deserialize, Serialize};

/// Typed reference to either resource kind
///
/// Used by the payment-intent index so a webhook referencing an
/// external payment ref can be routed to the right row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceKey {
    Delivery(String),
    Rental(String),
}

impl ResourceKey {
    pub fn id(&self) -> &str {
        match self {
            Self::Delivery(id) | Self::Rental(id) => id,
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivery(id) => write!(f, "delivery:{}", id),
            Self::Rental(id) => write!(f, "rental:{}", id),
        }
    }
}
