// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Holds the state map for the lifetime of the process. Used by tests and by
// dry runs, where the loaded state is copied in and never written back.
//
// ## Crash Behavior
//
// - All state is lost on exit
// - The next run treats every target as a first observation (silent cold start)

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::state_store::{StateStore, StateStoreFactory};
use crate::watch::StateMap;

/// In-memory state store implementation
///
/// Clones share the same map, so a test can keep a handle and inspect what
/// the engine saved.
///
/// # Example
///
/// ```rust,no_run
/// use pagewatch_core::state::MemoryStateStore;
/// use pagewatch_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     let states = store.load().await?;
///     store.save(&states).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<StateMap>>,
    saves: Arc<std::sync::atomic::AtomicUsize>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with a state map
    pub fn with_states(states: StateMap) -> Self {
        Self {
            inner: Arc::new(RwLock::new(states)),
            ..Self::default()
        }
    }

    /// Copy of the current map
    pub async fn snapshot(&self) -> StateMap {
        self.inner.read().await.clone()
    }

    /// Number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<StateMap, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, states: &StateMap) -> Result<(), Error> {
        *self.inner.write().await = states.clone();
        self.saves.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemoryStateStore`]
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, _config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
