//! Lifecycle engine: persisted snapshots, transition gate and the
//! authority that drives both state machines.

pub mod authority;
pub mod gate;
pub mod storage;

pub use authority::{LifecycleAuthority, ReviewDecision, WebhookEvent, WebhookOutcome};
pub use storage::{LifecycleStorage, StorageError, StorageResult};

#[cfg(test)]
mod tests;
