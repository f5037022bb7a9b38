// # State Store Trait
//
// Defines the interface for the persisted per-target state.
//
// ## Purpose
//
// The store holds one [`TargetState`](crate::watch::TargetState) per target
// identity. It is read once at the start of a run and written once at the end;
// the engine owns the map in between.
//
// ## Implementations
//
// - File-based: [`crate::state::FileStateStore`]
// - In-memory: [`crate::state::MemoryStateStore`]
// - GitHub Gist: `pagewatch-store-gist` crate
//
// ## Usage
//
// ```rust,ignore
// use pagewatch_core::StateStore;
//
// let store = /* StateStore implementation */;
// let states = store.load().await?;
// // ... run ...
// store.save(&states).await?;
// ```

use async_trait::async_trait;

use crate::watch::StateMap;

/// Trait for state store implementations
///
/// # Error Contract
///
/// Failures are returned as [`crate::Error::StateStore`] and are fatal to the
/// run: the caller aborts before any notification is sent.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, remote documents)
///
/// ## Forbidden Capabilities
/// - ❌ Interpret or modify records (owned by the engine)
/// - ❌ Spawn background tasks
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the full state map
    ///
    /// # Returns
    ///
    /// - `Ok(StateMap)`: the stored map, empty when nothing has been stored yet
    /// - `Err(Error)`: the store could not be read
    async fn load(&self) -> Result<StateMap, crate::Error>;

    /// Replace the stored map
    ///
    /// Implementations must replace the whole document atomically: a reader
    /// sees either the previous map or the new one.
    async fn save(&self, states: &StateMap) -> Result<(), crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this state store
    ///
    /// # Returns
    ///
    /// A boxed StateStore trait object
    async fn create(
        &self,
        config: &crate::config::StateStoreConfig,
    ) -> Result<Box<dyn StateStore>, crate::Error>;
}
