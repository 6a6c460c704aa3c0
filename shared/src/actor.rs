//! Actor model
//!
//! Every transition is requested by an actor: a customer, a driver, an
//! administrator, or the system itself (post-checkout hooks and
//! provider webhooks run as [`ActorRole::System`] with no actor id).

use serde::{Deserialize, Serialize};

/// Role of the actor requesting a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Driver,
    Admin,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Driver => "driver",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved actor
///
/// `id` is `None` for system-initiated transitions (webhook intake,
/// photo-store callbacks), which have no human principal behind them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<String>,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: ActorRole::Customer,
        }
    }

    pub fn driver(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: ActorRole::Driver,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            role: ActorRole::Admin,
        }
    }

    pub fn system() -> Self {
        Self {
            id: None,
            role: ActorRole::System,
        }
    }

    /// Whether this actor is the given principal
    pub fn is(&self, principal_id: &str) -> bool {
        self.id.as_deref() == Some(principal_id)
    }
}
