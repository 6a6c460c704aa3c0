//! External collaborator interfaces
//!
//! Identity resolution, photo evidence and notification delivery are
//! operated by other systems. The engine consumes them through traits
//! and ships dashmap-backed in-memory implementations for development
//! and tests.

pub mod identity;
pub mod notify;
pub mod photos;

pub use identity::{IdentityProvider, InMemoryIdentity};
pub use notify::{LoggingNotifier, Notification, Notifier, RecordingNotifier};
pub use photos::{InMemoryPhotoStore, PhotoPhase, PhotoStore};
