//! Payment provider interface and mock implementation
//!
//! The real provider lives across the network; signature verification
//! of its webhooks happens upstream. [`MockProvider`] stands in for
//! development and tests and counts every call so tests can assert the
//! capture-at-most-once guarantee.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// Provider-side failures. All of them are transient from this
/// system's point of view: state is left unchanged and the caller may
/// retry.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected the request: {0}")]
    Rejected(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Place a hold on funds; returns the external intent reference
    async fn authorize(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: Value,
    ) -> Result<String, ProviderError>;

    /// Convert a prior hold into a charge
    async fn capture(&self, intent_ref: &str) -> Result<(), ProviderError>;

    /// Release a hold without charging
    async fn void(&self, intent_ref: &str) -> Result<(), ProviderError>;
}

/// In-process provider double with per-primitive call counters and
/// switchable failure injection.
#[derive(Debug, Default)]
pub struct MockProvider {
    authorize_calls: AtomicU64,
    capture_calls: AtomicU64,
    void_calls: AtomicU64,
    fail_authorize: AtomicBool,
    fail_capture: AtomicBool,
    fail_void: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authorize_calls(&self) -> u64 {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> u64 {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn void_calls(&self) -> u64 {
        self.void_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent authorize calls fail until switched back
    pub fn set_fail_authorize(&self, fail: bool) {
        self.fail_authorize.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent capture calls fail until switched back
    pub fn set_fail_capture(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_void(&self, fail: bool) {
        self.fail_void.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn authorize(
        &self,
        _amount_cents: i64,
        _currency: &str,
        _metadata: Value,
    ) -> Result<String, ProviderError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_authorize.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("injected authorize failure".into()));
        }
        Ok(format!("pi_{}", uuid::Uuid::new_v4().simple()))
    }

    async fn capture(&self, _intent_ref: &str) -> Result<(), ProviderError> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("injected capture failure".into()));
        }
        Ok(())
    }

    async fn void(&self, _intent_ref: &str) -> Result<(), ProviderError> {
        self.void_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_void.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("injected void failure".into()));
        }
        Ok(())
    }
}
