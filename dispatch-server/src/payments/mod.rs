//! Payment orchestration
//!
//! Wraps the external provider's authorize/capture/void primitives with
//! idempotency rules so transitions can retry safely:
//!
//! - authorize is retry-safe (an existing intent ref is reused, never a
//!   second hold),
//! - capture requires an authorization and short-circuits when already
//!   captured,
//! - void releases an authorized hold before a cancellation commits.

pub mod orchestrator;
pub mod provider;

pub use orchestrator::{AuthorizeOutcome, CaptureOutcome, PaymentOrchestrator, VoidOutcome, MIN_CHARGE_CENTS};
pub use provider::{MockProvider, PaymentProvider, ProviderError};
