//! Core traits for the pagewatch system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`TextAcquirer`]: Read a target's visible text
//! - [`Renderer`]: Headless browser primitives for the rendered engine
//! - [`StateStore`]: Whole-map persistence of per-target state
//! - [`Notifier`] / [`RecipientSource`]: Report delivery

pub mod acquirer;
pub mod notifier;
pub mod renderer;
pub mod state_store;

pub use acquirer::{AcquireRequest, AcquirerFactory, PageText, TextAcquirer};
pub use notifier::{Notifier, NotifierFactory, RecipientSource, StaticRecipients};
pub use renderer::{RenderContext, Renderer, RendererFactory};
pub use state_store::{StateStore, StateStoreFactory};
