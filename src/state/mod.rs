pub mod phase;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    dao::santa_store::SantaStore, error::ServiceError, notifier::Notifier, services::auth::AdminRoster,
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing collaborators and the per-chat gates.
pub struct AppState {
    store: RwLock<Option<Arc<dyn SantaStore>>>,
    notifier: Arc<dyn Notifier>,
    admins: AdminRoster,
    chat_gates: DashMap<i64, Arc<Mutex<()>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(admins: AdminRoster, notifier: Arc<dyn Notifier>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            notifier,
            admins,
            chat_gates: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn SantaStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current store or fail with the degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn SantaStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn SantaStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    ///
    /// Distinct from the store slot: the supervisor flips this while an
    /// installed backend is failing its health checks.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Record the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            let changed = *current != value;
            *current = value;
            changed
        });
    }

    /// Notifier used for chat and member messages.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    /// Admin roster backing the authorization gate.
    pub fn admins(&self) -> &AdminRoster {
        &self.admins
    }

    /// Gate serializing lifecycle operations of a single chat.
    ///
    /// Operations for different chats run concurrently; two operations for
    /// the same chat never interleave.
    pub fn chat_gate(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.chat_gates.entry(chat_id).or_default().clone()
    }
}
