//! Identity provider interface
//!
//! Session/credential verification lives outside this system. The API
//! layer hands the raw credential (bearer token) to the provider and
//! gets back a resolved [`Actor`] or `NotAuthenticated`.

use async_trait::async_trait;
use dashmap::DashMap;
use shared::{Actor, ActorRole, AppError, AppResult};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a credential to an actor. Fails with `NotAuthenticated`
    /// for unknown or expired credentials.
    async fn resolve_actor(&self, credential: &str) -> AppResult<Actor>;
}

/// In-memory credential table: token -> (principal id, role)
#[derive(Debug, Default)]
pub struct InMemoryIdentity {
    tokens: DashMap<String, (String, ActorRole)>,
}

impl InMemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential for `principal_id` with the given role
    pub fn register(&self, token: impl Into<String>, principal_id: impl Into<String>, role: ActorRole) {
        self.tokens.insert(token.into(), (principal_id.into(), role));
    }

    pub fn revoke(&self, token: &str) {
        self.tokens.remove(token);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn resolve_actor(&self, credential: &str) -> AppResult<Actor> {
        match self.tokens.get(credential) {
            Some(entry) => {
                let (id, role) = entry.value().clone();
                Ok(Actor {
                    id: Some(id),
                    role,
                })
            }
            None => Err(AppError::not_authenticated()),
        }
    }
}
