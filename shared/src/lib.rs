//! Shared types for the dispatch platform
//!
//! Common types used across crates: error codes and API response
//! structures, the actor/role model, resource snapshots for the two
//! coordinated resource kinds (delivery orders and vehicle rentals),
//! and the immutable lifecycle event record.

pub mod actor;
pub mod error;
pub mod resource;
pub mod util;

// Re-exports
pub use actor::{Actor, ActorRole};
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use resource::{
    DeliverySnapshot, DeliveryStatus, DepositRefundStatus, LifecycleEvent, PaymentState,
    RentalPurpose, RentalSnapshot, RentalStatus, ResourceKey, VerificationStatus,
};
pub use serde::{Deserialize, Serialize};
