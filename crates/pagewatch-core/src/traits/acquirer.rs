// # Text Acquirer Trait
//
// Defines the interface for reading the human-visible text of a target page.
//
// ## Implementations
//
// - Static: `pagewatch-fetch-http` crate (single HTTP GET, markup stripped locally)
// - Rendered: [`crate::acquire::RenderedAcquirer`] on top of any [`crate::traits::Renderer`]
//
// ## Usage
//
// ```rust,ignore
// use pagewatch_core::traits::{AcquireRequest, PageText, TextAcquirer};
//
// let acquirer = /* TextAcquirer implementation */;
// match acquirer.acquire(&AcquireRequest::for_target(&target)).await? {
//     PageText::Text(text) => println!("{} chars", text.len()),
//     PageText::Unknown { reason } => println!("no reading: {}", reason),
// }
// ```

use async_trait::async_trait;

use crate::config::{AcquisitionEngine, EngineConfig, TargetConfig};

/// What a single acquisition produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageText {
    /// Visible text of the scoped region (may be empty for the static engine)
    Text(String),
    /// No trustworthy reading this run
    Unknown {
        /// Diagnostic detail for logs
        reason: String,
    },
}

impl PageText {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown {
            reason: reason.into(),
        }
    }
}

/// Per-target acquisition parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireRequest<'a> {
    /// Page URL
    pub url: &'a str,
    /// Region whose text is read; `None` means the whole document
    pub scope_selector: Option<&'a str>,
    /// Element whose visibility gates sampling (rendered engine only)
    pub ready_selector: Option<&'a str>,
}

impl<'a> AcquireRequest<'a> {
    /// Build a request from a target, treating blank selectors as absent
    pub fn for_target(target: &'a TargetConfig) -> Self {
        Self {
            url: &target.url,
            scope_selector: target.scope(),
            ready_selector: target.ready(),
        }
    }
}

/// Trait for text acquirer implementations
///
/// # Error Contract
///
/// - `Ok(PageText::Text)`: a reading was taken
/// - `Ok(PageText::Unknown)`: the page was reachable but not ready or empty;
///   expected and transient, the engine keeps the previous state
/// - `Err(Error)`: hard failure (transport error, non-2xx status); the engine
///   logs it at error level and keeps the previous state
///
/// Implementations never panic and never abort the run.
#[async_trait]
pub trait TextAcquirer: Send + Sync {
    /// Read the visible text for one target
    async fn acquire(&self, request: &AcquireRequest<'_>) -> Result<PageText, crate::Error>;

    /// Engine kind this acquirer serves
    fn engine(&self) -> AcquisitionEngine;

    /// Release long-lived resources (browser processes) at the end of a run
    async fn shutdown(&self) -> Result<(), crate::Error> {
        Ok(())
    }
}

/// Helper trait for constructing acquirers from configuration
pub trait AcquirerFactory: Send + Sync {
    /// Create a TextAcquirer instance
    ///
    /// # Parameters
    ///
    /// - `config`: Shared engine settings (timeouts, user agent, retry policy)
    fn create(&self, config: &EngineConfig) -> Result<Box<dyn TextAcquirer>, crate::Error>;
}
