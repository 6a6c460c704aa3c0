//! Append-only lifecycle events
//!
//! Events are the audit record of every accepted transition and every
//! denied attempt. They are never updated or deleted, and they survive
//! deletion of the resource they describe.

use crate::actor::{Actor, ActorRole};
use crate::util::{new_id, now_millis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: String,
    /// Global monotonic sequence assigned at append time
    pub sequence: u64,
    pub resource_id: String,
    pub actor_id: Option<String>,
    pub actor_role: ActorRole,
    /// Event vocabulary entry, e.g. "driver_assigned" or "cancel_denied"
    pub event_type: String,
    pub payload: Value,
    pub occurred_at: i64,
}

impl LifecycleEvent {
    /// Build an event with sequence 0; storage assigns the real
    /// sequence when the event is appended.
    pub fn new(
        resource_id: impl Into<String>,
        actor: &Actor,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            event_id: new_id(),
            sequence: 0,
            resource_id: resource_id.into(),
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            event_type: event_type.into(),
            payload,
            occurred_at: now_millis(),
        }
    }
}
