//! Application state.

use std::sync::Arc;

use rawcache_storage::ObjectStore;

use crate::coordinator::{CachePolicy, Coordinator};
use crate::upstream::Upstream;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<Coordinator>,
}

impl AppState {
    /// Creates a new AppState around a coordinator.
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Creates an AppState from its collaborators.
    pub fn from_parts(
        store: Arc<dyn ObjectStore>,
        upstream: Arc<dyn Upstream>,
        policy: CachePolicy,
    ) -> Self {
        Self::new(Arc::new(Coordinator::new(store, upstream, policy)))
    }

    /// Returns the request coordinator.
    pub fn coordinator(&self) -> &Coordinator {
        self.coordinator.as_ref()
    }

    /// Returns the object store.
    pub fn store(&self) -> &dyn ObjectStore {
        self.coordinator.store().as_ref()
    }
}
