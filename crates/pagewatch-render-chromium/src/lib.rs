// # Headless Chromium Renderer
//
// This crate provides the browser behind the rendered acquisition engine.
//
// ## Lifecycle
//
// - The browser is launched lazily on the first `new_context()`, so runs
//   without rendered targets never start a process
// - Every context is a fresh tab; closing it decrements `active_contexts`
// - A browser whose protocol handler has exited, or that fails to open a tab,
//   is discarded and relaunched on the next `new_context()`
// - `shutdown()` closes the browser and stops the protocol handler task
//
// ## Locating Chromium
//
// `CHROME_PATH` wins when it points at an existing file; otherwise the usual
// binary names are looked up on `PATH`.
//
// Retry, readiness and text polling are owned by
// `pagewatch_core::acquire::RenderedAcquirer`; this crate only evaluates
// small DOM scripts inside the page.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use pagewatch_core::acquire::RenderedAcquirer;
use pagewatch_core::config::{AcquisitionEngine, EngineConfig};
use pagewatch_core::registry::CollaboratorRegistry;
use pagewatch_core::traits::{
    AcquirerFactory, RenderContext, Renderer, RendererFactory, TextAcquirer,
};
use pagewatch_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Renderer name used in the registry
pub const RENDERER_NAME: &str = "chromium";

/// Environment variable overriding the Chromium binary
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

const BINARY_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// Interval between network idle samples
const IDLE_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Find the Chromium binary path
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROME_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points at missing file {}", CHROME_PATH_ENV, p);
    }

    BINARY_NAMES.iter().find_map(|name| which::which(name).ok())
}

struct RunningBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl RunningBrowser {
    /// Stop the handler task; dropping the browser kills its process
    fn discard(self) {
        self.handler.abort();
    }
}

/// The handler task ends when the DevTools connection closes
fn handler_alive(handler: &JoinHandle<()>) -> bool {
    !handler.is_finished()
}

/// Chromium-based renderer
pub struct ChromiumRenderer {
    user_agent: String,
    running: Mutex<Option<RunningBrowser>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Create a renderer; the browser itself starts on first use
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            running: Mutex::new(None),
            active_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn launch(&self) -> Result<RunningBrowser> {
        let chrome_path = find_chromium().ok_or_else(|| {
            Error::render(format!(
                "Chromium not found; install it or set {}",
                CHROME_PATH_ENV
            ))
        })?;
        tracing::info!("Launching headless Chromium at {}", chrome_path.display());

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.user_agent))
            .build()
            .map_err(|e| Error::render(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::render(format!("Failed to launch Chromium: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Chromium handler event error: {}", e);
                }
            }
        });

        Ok(RunningBrowser { browser, handler })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let mut running = self.running.lock().await;
        if let Some(dead) = running.take_if(|r| !handler_alive(&r.handler)) {
            tracing::warn!("Chromium connection lost, relaunching");
            dead.discard();
        }
        if running.is_none() {
            *running = Some(self.launch().await?);
        }
        let browser = match running.as_ref() {
            Some(running) => &running.browser,
            None => return Err(Error::render("Browser is not running")),
        };

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Some(broken) = running.take() {
                    broken.discard();
                }
                return Err(Error::render(format!("Failed to open tab: {}", e)));
            }
        };

        self.active_count.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(mut running) = self.running.lock().await.take() else {
            return Ok(());
        };

        let closed = running.browser.close().await;
        if let Err(e) = running.browser.wait().await {
            tracing::debug!("Waiting for Chromium to exit failed: {}", e);
        }
        running.handler.abort();

        closed
            .map(|_| ())
            .map_err(|e| Error::render(format!("Failed to close Chromium: {}", e)))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// A single Chromium tab
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| Error::render(format!("Script evaluation failed: {}", e)))?
            .into_value()
            .map_err(|e| Error::render(format!("Unexpected script result: {:?}", e)))
    }

    /// Ready state plus the number of resource entries loaded so far
    async fn network_sample(&self) -> Result<(bool, u64)> {
        let (complete, resources): (bool, u64) = self
            .eval(
                "[document.readyState === 'complete', performance.getEntriesByType('resource').length]"
                    .to_string(),
            )
            .await?;
        Ok((complete, resources))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::render(format!("Navigation to {} failed: {}", url, e))),
            Err(_) => Err(Error::render(format!(
                "Navigation to {} timed out after {:?}",
                url, timeout
            ))),
        }
    }

    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<bool> {
        let settle = async {
            let mut last = None;
            loop {
                let (complete, resources) = self.network_sample().await?;
                if complete && last == Some(resources) {
                    return Ok::<_, Error>(());
                }
                last = Some(resources);
                tokio::time::sleep(IDLE_SAMPLE_INTERVAL).await;
            }
        };

        match tokio::time::timeout(timeout, settle).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(false),
        }
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool> {
        self.eval(visibility_script(selector)).await
    }

    async fn inner_text(&mut self, selector: &str) -> Result<Option<String>> {
        self.eval(inner_text_script(selector)).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        self.page
            .close()
            .await
            .map_err(|e| Error::render(format!("Failed to close tab: {}", e)))
    }
}

fn quote(selector: &str) -> String {
    serde_json::Value::String(selector.to_string()).to_string()
}

/// Script answering whether the first match is rendered and visible
///
/// An invalid selector counts as not visible.
fn visibility_script(selector: &str) -> String {
    format!(
        r#"(() => {{
  let el;
  try {{ el = document.querySelector({sel}); }} catch (_) {{ return false; }}
  if (!el) return false;
  const style = window.getComputedStyle(el);
  if (style.display === 'none' || style.visibility === 'hidden') return false;
  const rect = el.getBoundingClientRect();
  return rect.width > 0 || rect.height > 0;
}})()"#,
        sel = quote(selector)
    )
}

/// Script returning `innerText` of the first match, or `null`
fn inner_text_script(selector: &str) -> String {
    format!(
        r#"(() => {{
  let el;
  try {{ el = document.querySelector({sel}); }} catch (_) {{ return null; }}
  return el ? el.innerText : null;
}})()"#,
        sel = quote(selector)
    )
}

/// Factory for [`ChromiumRenderer`]
pub struct ChromiumRendererFactory;

impl RendererFactory for ChromiumRendererFactory {
    fn create(&self, config: &EngineConfig) -> Result<Arc<dyn Renderer>> {
        Ok(Arc::new(ChromiumRenderer::new(config)))
    }
}

/// Factory for the rendered acquisition engine backed by Chromium
pub struct ChromiumAcquirerFactory;

impl AcquirerFactory for ChromiumAcquirerFactory {
    fn create(&self, config: &EngineConfig) -> Result<Box<dyn TextAcquirer>> {
        let renderer = ChromiumRendererFactory.create(config)?;
        Ok(Box::new(RenderedAcquirer::new(renderer, config)))
    }
}

/// Register the Chromium renderer and the rendered engine with a registry
pub fn register(registry: &CollaboratorRegistry) {
    registry.register_renderer(RENDERER_NAME, Box::new(ChromiumRendererFactory));
    registry.register_acquirer(AcquisitionEngine::Rendered, Box::new(ChromiumAcquirerFactory));
}
