//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 400 Bad Request
            Self::ValidationFailed | Self::InvalidRequest | Self::InvalidAmount => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::PermissionDenied => StatusCode::FORBIDDEN,

            // 404 Not Found
            Self::NotFound => StatusCode::NOT_FOUND,

            // 409 Conflict (retryable: re-fetch and retry)
            Self::Conflict => StatusCode::CONFLICT,

            // 422 Unprocessable Entity - gating denials are expected,
            // routine outcomes and carry their sub-reason verbatim
            Self::InvalidState
            | Self::NotOwner
            | Self::NotDraft
            | Self::NotAssignee
            | Self::MissingProof
            | Self::InvalidPurpose
            | Self::VerificationRequired
            | Self::NotPaid
            | Self::PickupNotAllowed
            | Self::MissingReason
            | Self::AlreadyResolved => StatusCode::UNPROCESSABLE_ENTITY,

            // 503 Service Unavailable - transient, retryable
            Self::PaymentProviderError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error - NoAuthorization and invariant
            // violations indicate data-integrity bugs, surfaced opaque
            Self::Unknown
            | Self::NoAuthorization
            | Self::PaymentInvariantViolation
            | Self::InternalError
            | Self::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
