//! Payment state
//!
//! Two-phase protocol: funds are held (`Authorized`) at checkout and
//! converted into a charge (`Captured`) on completion, or released
//! (`Voided`) on cancellation.

use serde::{Deserialize, Serialize};

/// Payment state of a resource
///
/// Transitions only move forward:
/// `None -> Authorized -> Captured`, or `Authorized -> Voided`.
/// Capture is permitted only from `Authorized`; capturing an already
/// `Captured` resource is an idempotent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    None,
    Authorized,
    Captured,
    Voided,
}

impl PaymentState {
    /// Whether a forward step to `next` is permitted
    ///
    /// Staying in place is allowed (idempotent re-application); moving
    /// backwards never is.
    pub fn can_advance_to(&self, next: PaymentState) -> bool {
        use PaymentState::*;
        matches!(
            (self, next),
            (None, Authorized)
                | (Authorized, Captured)
                | (Authorized, Voided)
                | (None, None)
                | (Authorized, Authorized)
                | (Captured, Captured)
                | (Voided, Voided)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::Voided => "voided",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
