//! Append-only audit log
//!
//! Every transition attempt, accepted or denied, produces exactly one
//! audit event. Recording is best-effort relative to the primary state
//! change: the snapshot write has committed before the log call is
//! attempted, and a failed append never rolls it back. Failed appends
//! go to a retry channel consumed by [`AuditWorker`] so silent loss is
//! at least observable.

pub mod service;
pub mod worker;

pub use service::AuditService;
pub use worker::AuditWorker;
