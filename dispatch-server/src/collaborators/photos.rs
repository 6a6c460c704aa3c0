//! Photo/evidence store interface
//!
//! Deliveries require photographic proof at pickup and dropoff. The
//! actual object storage is external; the gate only ever asks whether
//! a photo exists for a (resource, phase) pair.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Which leg of the delivery the photo documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoPhase {
    Pickup,
    Dropoff,
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn has_photo(&self, resource_id: &str, phase: PhotoPhase) -> bool;
}

/// In-memory photo index for development and tests
#[derive(Debug, Default)]
pub struct InMemoryPhotoStore {
    photos: DashMap<(String, PhotoPhase), ()>,
}

impl InMemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_photo(&self, resource_id: impl Into<String>, phase: PhotoPhase) {
        self.photos.insert((resource_id.into(), phase), ());
    }
}

#[async_trait]
impl PhotoStore for InMemoryPhotoStore {
    async fn has_photo(&self, resource_id: &str, phase: PhotoPhase) -> bool {
        self.photos.contains_key(&(resource_id.to_string(), phase))
    }
}
