//! Gating & verification engine
//!
//! Pure predicate layer: given a resource snapshot, a requested action
//! and the requesting actor, answer allow / deny with a reason from the
//! closed denial taxonomy. No I/O, no side effects; anything the rules
//! need from a collaborator (photo presence) arrives as pre-gathered
//! facts.
//!
//! Authorization and precondition logic for every transition lives in
//! one table-driven match per resource kind, so the rules are testable
//! in one place instead of being scattered across request handlers.

mod delivery;
mod rental;

pub use delivery::{evaluate_delivery, DeliveryAction, DeliveryFacts};
pub use rental::{evaluate_rental, DepositDecision, RentalAction};

use serde_json::Value;
use shared::{Actor, ActorRole, AppError, ErrorCode};

/// A permitted transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Preconditions hold; apply the transition
    Proceed,
    /// The requested end state is already in effect; succeed without
    /// writing (idempotent re-application)
    Noop,
}

/// A denied transition
#[derive(Debug, Clone, PartialEq)]
pub struct Deny {
    pub code: ErrorCode,
    pub detail: Option<Value>,
}

impl Deny {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: Value) -> Self {
        Self {
            code,
            detail: Some(detail),
        }
    }
}

impl From<Deny> for AppError {
    fn from(deny: Deny) -> Self {
        let mut err = AppError::new(deny.code);
        match deny.detail {
            // Flatten object details into the error's detail map
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    err = err.with_detail(key, value);
                }
            }
            Some(detail) => err = err.with_detail("detail", detail),
            None => {}
        }
        err
    }
}

pub type GateResult = Result<Gate, Deny>;

/// Admin-only actions
fn require_admin(actor: &Actor) -> Result<(), Deny> {
    if actor.role == ActorRole::Admin {
        Ok(())
    } else {
        Err(Deny::new(ErrorCode::PermissionDenied))
    }
}

/// System-only actions (webhooks, collaborator callbacks)
fn require_system(actor: &Actor) -> Result<(), Deny> {
    if actor.role == ActorRole::System {
        Ok(())
    } else {
        Err(Deny::new(ErrorCode::PermissionDenied))
    }
}

/// Owner-only actions: the actor must be the owning customer.
/// A customer who is not the owner gets `NotOwner`; any other role
/// gets `PermissionDenied`.
fn require_owner(actor: &Actor, owner_id: &str) -> Result<(), Deny> {
    match actor.role {
        ActorRole::Customer if actor.is(owner_id) => Ok(()),
        ActorRole::Customer => Err(Deny::new(ErrorCode::NotOwner)),
        _ => Err(Deny::new(ErrorCode::PermissionDenied)),
    }
}

/// Owner-or-admin actions (cancellation)
fn require_owner_or_admin(actor: &Actor, owner_id: &str) -> Result<(), Deny> {
    if actor.role == ActorRole::Admin {
        return Ok(());
    }
    require_owner(actor, owner_id)
}
