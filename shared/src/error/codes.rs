//! Unified error codes for the dispatch platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Precondition (gating) errors
//! - 4xxx: Concurrency errors
//! - 5xxx: Payment errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient
/// serialization and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Wrong actor or role for the requested action
    PermissionDenied = 2001,

    // ==================== 3xxx: Precondition (gating denials) ====================
    /// Transition not allowed from the resource's current status
    InvalidState = 3001,
    /// Actor is not the owner of the resource
    NotOwner = 3002,
    /// Resource is no longer a draft
    NotDraft = 3003,
    /// Actor is not the assigned driver
    NotAssignee = 3004,
    /// Required photo evidence is missing
    MissingProof = 3005,
    /// Rental purpose is not one of the accepted values
    InvalidPurpose = 3006,
    /// Identity verification has not been approved
    VerificationRequired = 3007,
    /// Rental has not been paid
    NotPaid = 3008,
    /// Pickup preconditions are not all met
    PickupNotAllowed = 3009,
    /// A non-empty reason is required for this action
    MissingReason = 3010,
    /// Deposit has already been resolved
    AlreadyResolved = 3011,

    // ==================== 4xxx: Concurrency ====================
    /// Lost a concurrent race; re-fetch and retry
    Conflict = 4001,

    // ==================== 5xxx: Payment ====================
    /// Amount is below the provider's minimum chargeable unit
    InvalidAmount = 5001,
    /// Capture requested with no authorization in place
    NoAuthorization = 5002,
    /// Transient payment provider failure; retryable
    PaymentProviderError = 5003,
    /// Payment state invariant violated; fatal, alerts out-of-band
    PaymentInvariantViolation = 5004,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Storage layer error
    StorageError = 9002,
}

impl ErrorCode {
    /// Get the numeric value of this error code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Default human-readable message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",

            ErrorCode::NotAuthenticated => "Caller is not authenticated",

            ErrorCode::PermissionDenied => "Permission denied",

            ErrorCode::InvalidState => "Transition not allowed from current status",
            ErrorCode::NotOwner => "Actor does not own this resource",
            ErrorCode::NotDraft => "Resource is no longer a draft",
            ErrorCode::NotAssignee => "Actor is not the assigned driver",
            ErrorCode::MissingProof => "Required photo evidence is missing",
            ErrorCode::InvalidPurpose => "Rental purpose is not accepted",
            ErrorCode::VerificationRequired => "Identity verification not approved",
            ErrorCode::NotPaid => "Rental has not been paid",
            ErrorCode::PickupNotAllowed => "Pickup preconditions are not met",
            ErrorCode::MissingReason => "A non-empty reason is required",
            ErrorCode::AlreadyResolved => "Deposit has already been resolved",

            ErrorCode::Conflict => "Lost a concurrent update race",

            ErrorCode::InvalidAmount => "Amount below minimum chargeable unit",
            ErrorCode::NoAuthorization => "No payment authorization in place",
            ErrorCode::PaymentProviderError => "Payment provider error",
            ErrorCode::PaymentInvariantViolation => "Payment state invariant violated",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Storage error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.code(), self.message())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 to [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::Unknown),
            2 => Ok(Self::ValidationFailed),
            3 => Ok(Self::NotFound),
            5 => Ok(Self::InvalidRequest),
            1001 => Ok(Self::NotAuthenticated),
            2001 => Ok(Self::PermissionDenied),
            3001 => Ok(Self::InvalidState),
            3002 => Ok(Self::NotOwner),
            3003 => Ok(Self::NotDraft),
            3004 => Ok(Self::NotAssignee),
            3005 => Ok(Self::MissingProof),
            3006 => Ok(Self::InvalidPurpose),
            3007 => Ok(Self::VerificationRequired),
            3008 => Ok(Self::NotPaid),
            3009 => Ok(Self::PickupNotAllowed),
            3010 => Ok(Self::MissingReason),
            3011 => Ok(Self::AlreadyResolved),
            4001 => Ok(Self::Conflict),
            5001 => Ok(Self::InvalidAmount),
            5002 => Ok(Self::NoAuthorization),
            5003 => Ok(Self::PaymentProviderError),
            5004 => Ok(Self::PaymentInvariantViolation),
            9001 => Ok(Self::InternalError),
            9002 => Ok(Self::StorageError),
            other => Err(InvalidErrorCode(other)),
        }
    }
}
