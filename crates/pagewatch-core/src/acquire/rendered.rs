//! Rendered acquisition engine
//!
//! Drives a [`Renderer`] through one observation of a page:
//!
//! 1. Navigate (bounded by `navigation_timeout`)
//! 2. Wait for network quiescence (best effort)
//! 3. Wait for the readiness anchor to become visible: `ready_selector`,
//!    else `scope_selector`, else `body`. Never visible ⇒ `Unknown`
//! 4. Poll the text anchor (`scope_selector` or `body`) until it yields
//!    non-empty text. Still empty at the deadline ⇒ `Unknown`
//!
//! Both waits are bounded by the tokio clock as well as by the number of
//! poll intervals slept, so a context whose checks hang still gives up on time.
//!
//! Unexpected browser errors at any step fail the attempt. Attempts are
//! retried with doubling backoff up to `max_render_attempts`; every attempt
//! runs in a fresh context that is closed before the next attempt starts.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::collapse_whitespace;
use super::sleeper::{Sleeper, TokioSleeper};
use crate::config::{AcquisitionEngine, EngineConfig};
use crate::error::{Error, Result};
use crate::traits::{AcquireRequest, PageText, RenderContext, Renderer, TextAcquirer};

/// Selector used when a target names no anchor
pub const DOCUMENT_ROOT: &str = "body";

/// Text acquirer for JavaScript-rendered pages
pub struct RenderedAcquirer {
    renderer: Arc<dyn Renderer>,
    sleeper: Arc<dyn Sleeper>,
    navigation_timeout: Duration,
    network_idle_timeout: Duration,
    ready_timeout: Duration,
    text_deadline: Duration,
    poll_interval: Duration,
    max_attempts: usize,
    backoff_base: Duration,
}

impl RenderedAcquirer {
    /// Create an acquirer using the real tokio clock
    pub fn new(renderer: Arc<dyn Renderer>, config: &EngineConfig) -> Self {
        Self {
            renderer,
            sleeper: Arc::new(TokioSleeper),
            navigation_timeout: config.navigation_timeout(),
            network_idle_timeout: config.network_idle_timeout(),
            ready_timeout: config.ready_timeout(),
            text_deadline: config.text_deadline(),
            poll_interval: config.poll_interval(),
            max_attempts: config.max_render_attempts.max(1),
            backoff_base: config.render_backoff_base(),
        }
    }

    /// Replace the sleeper used for backoff and polling
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Delay after a failed attempt (1-based): base, 2×base, 4×base, …
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.backoff_base.saturating_mul(1u32 << exponent)
    }

    /// One attempt in a fresh context; the context is closed on every path
    async fn attempt(&self, request: &AcquireRequest<'_>) -> Result<PageText> {
        let mut context = self.renderer.new_context().await?;
        let result = self.observe(context.as_mut(), request).await;
        if let Err(e) = context.close().await {
            warn!("Failed to close browser context for {}: {}", request.url, e);
        }
        result
    }

    async fn observe(
        &self,
        context: &mut dyn RenderContext,
        request: &AcquireRequest<'_>,
    ) -> Result<PageText> {
        context.navigate(request.url, self.navigation_timeout).await?;

        match context.wait_for_network_idle(self.network_idle_timeout).await {
            Ok(true) => {}
            Ok(false) => debug!("Network did not settle for {}, continuing", request.url),
            Err(e) => debug!("Network idle wait failed for {}: {}, continuing", request.url, e),
        }

        let ready_anchor = request
            .ready_selector
            .or(request.scope_selector)
            .unwrap_or(DOCUMENT_ROOT);
        if !self.wait_until_visible(context, ready_anchor).await? {
            return Ok(PageText::unknown(format!(
                "readiness anchor '{}' not visible within {:?}",
                ready_anchor, self.ready_timeout
            )));
        }

        let text_anchor = request.scope_selector.unwrap_or(DOCUMENT_ROOT);
        match self.poll_text(context, text_anchor).await? {
            Some(text) => Ok(PageText::Text(text)),
            None => Ok(PageText::unknown(format!(
                "text anchor '{}' still empty after {:?}",
                text_anchor, self.text_deadline
            ))),
        }
    }

    async fn wait_until_visible(
        &self,
        context: &mut dyn RenderContext,
        selector: &str,
    ) -> Result<bool> {
        let wait = async {
            let mut waited = Duration::ZERO;
            loop {
                if context.is_visible(selector).await? {
                    return Ok::<_, Error>(true);
                }
                if waited >= self.ready_timeout {
                    return Ok(false);
                }
                self.sleeper.sleep(self.poll_interval).await;
                waited += self.poll_interval;
            }
        };

        // Slow visibility checks must not stretch the wait past the budget
        match tokio::time::timeout(self.ready_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Ok(false),
        }
    }

    async fn poll_text(
        &self,
        context: &mut dyn RenderContext,
        selector: &str,
    ) -> Result<Option<String>> {
        let poll = async {
            let mut waited = Duration::ZERO;
            loop {
                if let Some(raw) = context.inner_text(selector).await? {
                    let text = collapse_whitespace(&raw);
                    if !text.is_empty() {
                        return Ok::<_, Error>(Some(text));
                    }
                }
                if waited >= self.text_deadline {
                    return Ok(None);
                }
                self.sleeper.sleep(self.poll_interval).await;
                waited += self.poll_interval;
            }
        };

        match tokio::time::timeout(self.text_deadline, poll).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl TextAcquirer for RenderedAcquirer {
    async fn acquire(&self, request: &AcquireRequest<'_>) -> Result<PageText> {
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.max_attempts {
            match self.attempt(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(
                        "Render attempt {}/{} failed for {}: {}",
                        attempt, self.max_attempts, request.url, e
                    );
                    last_error = Some(e);

                    if attempt < self.max_attempts {
                        self.sleeper.sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        error!(
            "Giving up on {} after {} render attempts: {}",
            request.url, self.max_attempts, reason
        );
        Ok(PageText::unknown(format!(
            "render failed after {} attempts: {}",
            self.max_attempts, reason
        )))
    }

    fn engine(&self) -> AcquisitionEngine {
        AcquisitionEngine::Rendered
    }

    async fn shutdown(&self) -> Result<()> {
        self.renderer.shutdown().await
    }
}
