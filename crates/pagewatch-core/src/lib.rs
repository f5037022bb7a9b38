// # pagewatch-core
//
// Core library for the keyword-driven page availability watcher.
//
// ## Architecture Overview
//
// - **TextAcquirer**: Reads a target page's human-visible text (static or rendered)
// - **watch**: Keyword evaluation, the tri-state availability decision and the
//   per-target state machine with hysteresis
// - **WatchEngine**: Runs every target through acquire → evaluate → decide → update
// - **Watcher**: One full cycle: load state, run, save state, notify
// - **StateStore / Notifier / RecipientSource**: Narrow collaborator interfaces
// - **CollaboratorRegistry**: Plugin-based registry for collaborators
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Pure decision logic is separate from I/O
// 2. **Plugin-Based**: Collaborators are registered by name, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Fail Safe**: An unreadable page never changes state or sends a message

pub mod acquire;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod registry;
pub mod state;
pub mod traits;
pub mod watch;

// Re-export core types for convenience
pub use acquire::RenderedAcquirer;
pub use config::{
    AcquisitionEngine, EngineConfig, NotifierConfig, StateStoreConfig, TargetConfig, WatchConfig,
};
pub use engine::{CommittedRun, CycleReport, RunResult, RunStats, WatchEngine, WatchEvent, Watcher};
pub use error::{Error, Result};
pub use notify::{DeliveryReport, LogNotifier, broadcast, merge_recipients};
pub use registry::CollaboratorRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{Notifier, RecipientSource, Renderer, StateStore, TextAcquirer};
pub use watch::{StateMap, Status, TargetId, TargetState, Transition, Verdict};
