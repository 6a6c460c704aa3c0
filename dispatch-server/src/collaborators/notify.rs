//! Notification service interface
//!
//! Notifications are strictly best-effort: a failed send is logged and
//! never surfaces to the caller or blocks a transition.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

/// A rendered notification request
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: String,
    pub template: String,
    pub data: Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification. Implementations log failures internally;
    /// callers never observe them.
    async fn notify(&self, recipient: &str, template: &str, data: Value);
}

/// Default notifier: logs the would-be delivery
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, recipient: &str, template: &str, data: Value) {
        tracing::info!(recipient, template, %data, "Notification dispatched");
    }
}

/// Test notifier that records every delivery
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, template: &str, data: Value) {
        self.sent.lock().push(Notification {
            recipient: recipient.to_string(),
            template: template.to_string(),
            data,
        });
    }
}
