// # Renderer Trait
//
// Abstracts the headless browser used by the rendered acquisition engine.
//
// ## Implementations
//
// - Chromium: `pagewatch-render-chromium` crate
//
// The retry, readiness and polling logic lives in
// [`crate::acquire::RenderedAcquirer`]; a renderer only exposes the browser
// primitives it needs.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;

/// A browser engine that can create isolated contexts
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Launch and own a browser process
/// - ✅ Spawn the protocol handler task the browser binding requires
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by `RenderedAcquirer`)
/// - ❌ Decide readiness (owned by `RenderedAcquirer`)
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a fresh browser context (isolated tab)
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, crate::Error>;

    /// Close the browser process, if one was started
    async fn shutdown(&self) -> Result<(), crate::Error>;

    /// Number of contexts created and not yet closed
    fn active_contexts(&self) -> usize;
}

/// A single browser context
#[async_trait]
pub trait RenderContext: Send {
    /// Navigate to a URL, failing if the page does not load within `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), crate::Error>;

    /// Wait until the page's network activity settles
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: network went idle
    /// - `Ok(false)`: `timeout` elapsed first (tolerated by callers)
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<bool, crate::Error>;

    /// Whether the first element matching `selector` is rendered and visible
    async fn is_visible(&mut self, selector: &str) -> Result<bool, crate::Error>;

    /// `innerText` of the first element matching `selector`, `None` if nothing matches
    async fn inner_text(&mut self, selector: &str) -> Result<Option<String>, crate::Error>;

    /// Tear down this context
    async fn close(self: Box<Self>) -> Result<(), crate::Error>;
}

/// Helper trait for constructing renderers from configuration
pub trait RendererFactory: Send + Sync {
    /// Create a Renderer instance
    ///
    /// Implementations should launch lazily so that runs without rendered
    /// targets never start a browser.
    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn Renderer>, crate::Error>;
}
