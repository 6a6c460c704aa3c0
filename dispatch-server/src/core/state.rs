//! Server state - shared service handles
//!
//! Cloning is cheap; every service sits behind an `Arc`.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use shared::{ActorRole, AppError, AppResult, LifecycleEvent};
use tokio::sync::mpsc;

use crate::audit::{AuditService, AuditWorker};
use crate::collaborators::{IdentityProvider, InMemoryIdentity, InMemoryPhotoStore, LoggingNotifier};
use crate::core::Config;
use crate::lifecycle::{LifecycleAuthority, LifecycleStorage};
use crate::payments::{MockProvider, PaymentOrchestrator};

/// Server state - holds shared references to every service
///
/// | Field | Type | Role |
/// |-------|------|------|
/// | config | Config | Configuration (immutable) |
/// | storage | LifecycleStorage | Embedded lifecycle database (redb) |
/// | authority | Arc<LifecycleAuthority> | Transition driver |
/// | audit | Arc<AuditService> | Append-only event trail |
/// | identity | Arc<InMemoryIdentity> | Credential to actor resolution |
/// | photo_index | Arc<InMemoryPhotoStore> | Proof-of-handling photo index |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: LifecycleStorage,
    pub authority: Arc<LifecycleAuthority>,
    pub audit: Arc<AuditService>,
    pub identity: Arc<InMemoryIdentity>,
    pub photo_index: Arc<InMemoryPhotoStore>,
    /// Receiver half of the audit retry channel, taken once by
    /// [`Self::start_background_tasks`]
    audit_retry_rx: Arc<Mutex<Option<mpsc::Receiver<LifecycleEvent>>>>,
}

impl ServerState {
    /// Initialize all services.
    ///
    /// Opens (or creates) the lifecycle database under
    /// `work_dir/lifecycle.redb` and wires the authority against the
    /// mock payment provider. In development mode a set of demo
    /// credentials is seeded so the API is usable out of the box.
    pub fn initialize(config: &Config) -> AppResult<Self> {
        let work_dir = PathBuf::from(&config.work_dir);
        std::fs::create_dir_all(&work_dir)
            .map_err(|e| AppError::internal(format!("Failed to create work directory: {}", e)))?;

        let storage = LifecycleStorage::open(work_dir.join("lifecycle.redb"))?;

        let provider = Arc::new(MockProvider::new());
        let orchestrator = PaymentOrchestrator::new(provider);
        let (audit, retry_rx) = AuditService::new(storage.clone(), config.audit_retry_buffer);

        let identity = Arc::new(InMemoryIdentity::new());
        if !config.is_production() {
            identity.register("dev-customer", "customer-1", ActorRole::Customer);
            identity.register("dev-driver", "driver-1", ActorRole::Driver);
            identity.register("dev-admin", "admin-1", ActorRole::Admin);
        }

        let photo_index = Arc::new(InMemoryPhotoStore::new());
        let authority = Arc::new(LifecycleAuthority::new(
            storage.clone(),
            orchestrator,
            audit.clone(),
            photo_index.clone(),
            Arc::new(LoggingNotifier),
        ));

        Ok(Self {
            config: config.clone(),
            storage,
            authority,
            audit,
            identity,
            photo_index,
            audit_retry_rx: Arc::new(Mutex::new(Some(retry_rx))),
        })
    }

    /// Start background tasks. Call once, before `Server::run()`.
    pub fn start_background_tasks(&self) {
        if let Some(rx) = self.audit_retry_rx.lock().take() {
            let worker = AuditWorker::new(self.storage.clone());
            tokio::spawn(worker.run(rx));
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }

    pub fn identity_provider(&self) -> Arc<dyn IdentityProvider> {
        self.identity.clone()
    }
}
