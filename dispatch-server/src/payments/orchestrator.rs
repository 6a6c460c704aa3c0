//! Payment orchestrator
//!
//! Stateless with respect to persistence: it reads the payment fields
//! it is handed, talks to the provider, and tells the caller what the
//! fields should become. The transition authority owns the conditional
//! write that makes the outcome durable.

use std::sync::Arc;

use serde_json::Value;
use shared::{AppError, AppResult, ErrorCode, PaymentState};

use super::provider::PaymentProvider;

/// Provider minimum chargeable unit in cents
pub const MIN_CHARGE_CENTS: i64 = 50;

/// Result of an authorize request
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizeOutcome {
    /// A new hold was placed; carries the external intent reference
    Created(String),
    /// A hold already existed; no second hold was placed
    Existing(String),
}

impl AuthorizeOutcome {
    pub fn intent_ref(&self) -> &str {
        match self {
            Self::Created(r) | Self::Existing(r) => r,
        }
    }
}

/// Result of a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The provider charged the hold
    Captured,
    /// Already captured; the provider was not contacted
    AlreadyCaptured,
}

/// Result of a void request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoidOutcome {
    Voided,
    /// No hold to release (payment never authorized)
    NothingToVoid,
}

#[derive(Clone)]
pub struct PaymentOrchestrator {
    provider: Arc<dyn PaymentProvider>,
}

impl PaymentOrchestrator {
    pub fn new(provider: Arc<dyn PaymentProvider>) -> Self {
        Self { provider }
    }

    /// Place a hold for `amount_cents`, or reuse the existing one.
    ///
    /// Retry-safe: when the resource already carries an intent ref with
    /// an authorized (or later) payment state, that ref is returned and
    /// the provider is not contacted, so a retried checkout can never
    /// create a duplicate hold.
    pub async fn authorize(
        &self,
        existing_ref: Option<&str>,
        state: PaymentState,
        amount_cents: i64,
        currency: &str,
        metadata: Value,
    ) -> AppResult<AuthorizeOutcome> {
        if let Some(r) = existing_ref
            && state != PaymentState::None
        {
            return Ok(AuthorizeOutcome::Existing(r.to_string()));
        }

        if amount_cents < MIN_CHARGE_CENTS {
            return Err(AppError::new(ErrorCode::InvalidAmount)
                .with_detail("amount_cents", amount_cents)
                .with_detail("minimum_cents", MIN_CHARGE_CENTS));
        }

        let intent_ref = self
            .provider
            .authorize(amount_cents, currency, metadata)
            .await
            .map_err(|e| AppError::payment_provider(e.to_string()))?;

        Ok(AuthorizeOutcome::Created(intent_ref))
    }

    /// Charge a previously placed hold.
    ///
    /// `Captured` short-circuits without a provider call. Any state
    /// other than `Authorized`/`Captured` means the caller skipped the
    /// authorize step, which gating should have made impossible.
    pub async fn capture(
        &self,
        intent_ref: Option<&str>,
        state: PaymentState,
    ) -> AppResult<CaptureOutcome> {
        match state {
            PaymentState::Captured => return Ok(CaptureOutcome::AlreadyCaptured),
            PaymentState::Authorized => {}
            PaymentState::None | PaymentState::Voided => {
                return Err(AppError::with_message(
                    ErrorCode::NoAuthorization,
                    format!("capture requested with payment_state {}", state),
                ));
            }
        }

        let intent_ref = intent_ref.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::PaymentInvariantViolation,
                "authorized payment has no intent reference",
            )
        })?;

        self.provider
            .capture(intent_ref)
            .await
            .map_err(|e| AppError::payment_provider(e.to_string()))?;

        Ok(CaptureOutcome::Captured)
    }

    /// Release an authorized hold. A payment that never reached
    /// `Authorized` has nothing to release.
    pub async fn void(
        &self,
        intent_ref: Option<&str>,
        state: PaymentState,
    ) -> AppResult<VoidOutcome> {
        match state {
            PaymentState::Authorized => {}
            PaymentState::None => return Ok(VoidOutcome::NothingToVoid),
            PaymentState::Voided => return Ok(VoidOutcome::NothingToVoid),
            PaymentState::Captured => {
                return Err(AppError::with_message(
                    ErrorCode::PaymentInvariantViolation,
                    "void requested for a captured payment",
                ));
            }
        }

        let intent_ref = intent_ref.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::PaymentInvariantViolation,
                "authorized payment has no intent reference",
            )
        })?;

        self.provider
            .void(intent_ref)
            .await
            .map_err(|e| AppError::payment_provider(e.to_string()))?;

        Ok(VoidOutcome::Voided)
    }
}
