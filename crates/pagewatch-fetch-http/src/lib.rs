// # Static HTTP Text Acquirer
//
// This crate provides the static acquisition engine for the pagewatch system.
//
// ## Behavior
//
// - One GET per target with a fixed identifying user agent and a bounded timeout
// - Transport errors and non-2xx statuses are hard failures (no reading this run)
// - The document is narrowed to the first element matching `scope_selector`,
//   falling back to the whole document when the selector is absent, does not
//   parse, or matches nothing
// - Text is the human-visible text of that subtree: `<script>`, `<style>`,
//   `<noscript>` and `<template>` contents are dropped and whitespace collapsed
//
// No retries happen here; a failed target is simply read again next run.

use async_trait::async_trait;
use pagewatch_core::acquire::collapse_whitespace;
use pagewatch_core::config::{AcquisitionEngine, EngineConfig};
use pagewatch_core::registry::CollaboratorRegistry;
use pagewatch_core::traits::{AcquireRequest, AcquirerFactory, PageText, TextAcquirer};
use pagewatch_core::{Error, Result};
use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose contents are never human-visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Static (non-rendering) text acquirer
#[derive(Debug, Clone)]
pub struct StaticAcquirer {
    client: reqwest::Client,
}

impl StaticAcquirer {
    /// Create a new static acquirer
    ///
    /// # Parameters
    ///
    /// - `config`: Engine settings; `user_agent` and `request_timeout_secs` are used
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch the raw document body
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::acquisition(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::acquisition(format!("HTTP {} from {}", status, url)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::acquisition(format!("Failed to read body from {}: {}", url, e)))
    }
}

#[async_trait]
impl TextAcquirer for StaticAcquirer {
    async fn acquire(&self, request: &AcquireRequest<'_>) -> Result<PageText> {
        let html = self.fetch(request.url).await?;
        let text = extract_visible_text(&html, request.scope_selector);
        tracing::debug!("Read {} chars of text from {}", text.len(), request.url);
        Ok(PageText::Text(text))
    }

    fn engine(&self) -> AcquisitionEngine {
        AcquisitionEngine::Static
    }
}

/// Extract the visible text of a document, optionally narrowed by a selector
pub fn extract_visible_text(html: &str, scope_selector: Option<&str>) -> String {
    let document = Html::parse_document(html);
    let root = scope_selector
        .and_then(|selector| select_scope(&document, selector))
        .unwrap_or_else(|| document.root_element());
    visible_text(root)
}

fn select_scope<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let parsed = match Selector::parse(selector) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(
                "Invalid scope selector '{}': {:?}; using the whole document",
                selector,
                e
            );
            return None;
        }
    };

    let scope = document.select(&parsed).next();
    if scope.is_none() {
        tracing::debug!(
            "Scope selector '{}' matched nothing; using the whole document",
            selector
        );
    }
    scope
}

fn visible_text(root: ElementRef<'_>) -> String {
    let pieces: Vec<&str> = root
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some((node, &**text)),
            _ => None,
        })
        .filter(|(node, _)| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
            })
        })
        .map(|(_, text)| text)
        .collect();

    collapse_whitespace(&pieces.join(" "))
}

/// Factory for [`StaticAcquirer`]
pub struct StaticAcquirerFactory;

impl AcquirerFactory for StaticAcquirerFactory {
    fn create(&self, config: &EngineConfig) -> Result<Box<dyn TextAcquirer>> {
        Ok(Box::new(StaticAcquirer::new(config)?))
    }
}

/// Register the static acquirer with a registry
pub fn register(registry: &CollaboratorRegistry) {
    registry.register_acquirer(AcquisitionEngine::Static, Box::new(StaticAcquirerFactory));
}
