//! Dispatch Server - lifecycle transition and payment orchestration engine
//!
//! # Architecture
//!
//! Two resource kinds (delivery orders and vehicle rentals) are mutated by
//! four independent actors: customers, drivers, admins, and the payment
//! provider's asynchronous webhook. Every mutation funnels through one
//! pipeline:
//!
//! ```text
//! inbound action
//!     └─ LifecycleAuthority
//!          ├─ gate::evaluate        (pure precondition check)
//!          ├─ PaymentOrchestrator   (authorize / capture / void)
//!          ├─ conditional write     (redb, version compare-and-set)
//!          ├─ AuditService          (append-only event, best-effort)
//!          └─ Notifier              (failures swallowed)
//! ```
//!
//! # Module structure
//!
//! ```text
//! dispatch-server/src/
//! ├── core/           # Config, ServerState, HTTP server
//! ├── collaborators/  # Identity, photo store, notifier interfaces
//! ├── payments/       # Provider trait, orchestrator, mock provider
//! ├── lifecycle/      # Gating engine, transition authority, storage
//! ├── audit/          # Append-only audit service + retry worker
//! └── api/            # HTTP routes and handlers
//! ```

pub mod api;
pub mod audit;
pub mod collaborators;
pub mod core;
pub mod lifecycle;
pub mod payments;

// Re-export common types
pub use core::{Config, Server, ServerState};
pub use lifecycle::{LifecycleAuthority, LifecycleStorage};
pub use payments::{MockProvider, PaymentOrchestrator, PaymentProvider};

// Re-export unified error types from shared
pub use shared::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
