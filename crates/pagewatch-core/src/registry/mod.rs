//! Plugin-based collaborator registry
//!
//! The registry allows acquirers, renderers, state stores and notifiers to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagewatch_core::registry::CollaboratorRegistry;
//! use pagewatch_core::config::NotifierConfig;
//!
//! let registry = CollaboratorRegistry::with_builtins();
//! pagewatch_notify_line::register(&registry);
//!
//! let notifier = registry.create_notifier(&NotifierConfig::Line { .. })?;
//! ```
//!
//! ## Registration
//!
//! Plugin crates expose a `register` function:
//!
//! ```rust,ignore
//! // In pagewatch-notify-line
//! pub fn register(registry: &CollaboratorRegistry) {
//!     registry.register_notifier("line", Box::new(LineNotifierFactory));
//! }
//! ```

use crate::config::{AcquisitionEngine, EngineConfig, NotifierConfig, StateStoreConfig};
use crate::error::{Error, Result};
use crate::notify::LogNotifierFactory;
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::traits::{
    AcquirerFactory, Notifier, NotifierFactory, Renderer, RendererFactory, StateStore,
    StateStoreFactory, TextAcquirer,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Factories<F> = RwLock<HashMap<String, Arc<F>>>;

/// Registry for plugin-based collaborator creation
///
/// The registry maintains maps of type names to factory objects, allowing
/// dynamic instantiation based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct CollaboratorRegistry {
    /// Acquirer factories, keyed by engine name ("static", "rendered")
    acquirers: Factories<dyn AcquirerFactory>,

    /// Renderer factories (e.g. "chromium")
    renderers: Factories<dyn RendererFactory>,

    /// State store factories
    state_stores: Factories<dyn StateStoreFactory>,

    /// Notifier factories
    notifiers: Factories<dyn NotifierFactory>,
}

impl CollaboratorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the collaborators the core ships:
    /// `file` and `memory` state stores and the `log` notifier
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_state_store("file", Box::new(FileStateStoreFactory));
        registry.register_state_store("memory", Box::new(MemoryStateStoreFactory));
        registry.register_notifier("log", Box::new(LogNotifierFactory));
        registry
    }

    /// Register an acquirer factory for an engine kind
    pub fn register_acquirer(&self, engine: AcquisitionEngine, factory: Box<dyn AcquirerFactory>) {
        write(&self.acquirers).insert(engine.as_str().to_string(), Arc::from(factory));
    }

    /// Register a renderer factory
    ///
    /// # Parameters
    ///
    /// - `name`: Renderer name (e.g., "chromium")
    /// - `factory`: Factory object for creating renderer instances
    pub fn register_renderer(&self, name: impl Into<String>, factory: Box<dyn RendererFactory>) {
        write(&self.renderers).insert(name.into(), Arc::from(factory));
    }

    /// Register a state store factory
    ///
    /// # Parameters
    ///
    /// - `name`: State store type name (e.g., "file", "gist")
    /// - `factory`: Factory object for creating state store instances
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        write(&self.state_stores).insert(name.into(), Arc::from(factory));
    }

    /// Register a notifier factory
    ///
    /// # Parameters
    ///
    /// - `name`: Notifier type name (e.g., "line", "log")
    /// - `factory`: Factory object for creating notifier instances
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        write(&self.notifiers).insert(name.into(), Arc::from(factory));
    }

    /// Create the acquirer for an engine kind
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn TextAcquirer>)`: Created acquirer
    /// - `Err(Error)`: If no factory is registered for the engine or creation fails
    pub fn create_acquirer(
        &self,
        engine: AcquisitionEngine,
        config: &EngineConfig,
    ) -> Result<Box<dyn TextAcquirer>> {
        let factory = lookup(&self.acquirers, engine.as_str(), "acquirer")?;
        factory.create(config)
    }

    /// Create a renderer by name
    pub fn create_renderer(&self, name: &str, config: &EngineConfig) -> Result<Arc<dyn Renderer>> {
        let factory = lookup(&self.renderers, name, "renderer")?;
        factory.create(config)
    }

    /// Create a state store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StateStore>)`: Created state store instance
    /// - `Err(Error)`: If store type is not registered or creation fails
    pub async fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        // Lock is released before awaiting the factory
        let factory = lookup(&self.state_stores, config.type_name(), "state store")?;
        factory.create(config).await
    }

    /// Create a notifier from configuration
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        let factory = lookup(&self.notifiers, config.type_name(), "notifier")?;
        factory.create(config)
    }

    /// Check if an acquirer is registered for an engine kind
    pub fn has_acquirer(&self, engine: AcquisitionEngine) -> bool {
        read(&self.acquirers).contains_key(engine.as_str())
    }

    /// Check if a renderer type is registered
    pub fn has_renderer(&self, name: &str) -> bool {
        read(&self.renderers).contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        read(&self.state_stores).contains_key(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        read(&self.notifiers).contains_key(name)
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        sorted_keys(&self.state_stores)
    }

    /// List all registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        sorted_keys(&self.notifiers)
    }
}

// A poisoned lock only means another registration panicked; the map itself is intact
fn read<F: ?Sized>(map: &Factories<F>) -> RwLockReadGuard<'_, HashMap<String, Arc<F>>> {
    map.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<F: ?Sized>(map: &Factories<F>) -> RwLockWriteGuard<'_, HashMap<String, Arc<F>>> {
    map.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lookup<F: ?Sized>(map: &Factories<F>, name: &str, kind: &str) -> Result<Arc<F>> {
    read(map)
        .get(name)
        .cloned()
        .ok_or_else(|| Error::config(format!("Unknown {} type: {}", kind, name)))
}

fn sorted_keys<F: ?Sized>(map: &Factories<F>) -> Vec<String> {
    let mut keys: Vec<String> = read(map).keys().cloned().collect();
    keys.sort();
    keys
}
