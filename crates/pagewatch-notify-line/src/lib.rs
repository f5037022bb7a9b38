// # LINE Messaging API Notifier
//
// This crate delivers watch reports as LINE push messages.
//
// ## Behavior
//
// - One push request per recipient; fan-out is done by `pagewatch_core::notify::broadcast`
// - Bodies longer than the API limit are truncated with a trailing ellipsis
// - A status ≥ 300 is a delivery failure carrying the response body
// - ❌ NO retry logic (a failed delivery is logged and dropped)
//
// ## Security Requirements
//
// - The channel access token NEVER appears in logs or Debug output
// - The token MUST be provided via environment variables only
//
// ## API Reference
//
// - Push message: POST `/v2/bot/message/push`
//   `{"to": "<user id>", "messages": [{"type": "text", "text": "..."}]}`

use async_trait::async_trait;
use pagewatch_core::config::NotifierConfig;
use pagewatch_core::registry::CollaboratorRegistry;
use pagewatch_core::traits::{Notifier, NotifierFactory};
use pagewatch_core::{Error, Result};
use serde::Serialize;
use std::time::Duration;

/// LINE API base URL
const LINE_API_BASE: &str = "https://api.line.me";

/// HTTP timeout for push requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Maximum characters in one text message
pub const MAX_TEXT_CHARS: usize = 5000;

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// LINE push notifier
pub struct LineNotifier {
    /// Channel access token
    /// ⚠️ NEVER log this value
    channel_access_token: String,

    api_base: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the channel access token
impl std::fmt::Debug for LineNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineNotifier")
            .field("channel_access_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl LineNotifier {
    /// Create a new LINE notifier
    ///
    /// # Errors
    ///
    /// Fails fast if the token is empty or the HTTP client cannot be built.
    pub fn new(channel_access_token: impl Into<String>) -> Result<Self> {
        let channel_access_token = channel_access_token.into();
        if channel_access_token.trim().is_empty() {
            return Err(Error::config("LINE channel access token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            channel_access_token,
            api_base: LINE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the notifier at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn deliver(&self, recipient: &str, body: &str) -> Result<()> {
        let text = truncate_text(body, MAX_TEXT_CHARS);
        let payload = PushRequest {
            to: recipient,
            messages: [TextMessage {
                kind: "text",
                text: &text,
            }],
        };

        let url = format!("{}/v2/bot/message/push", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::notify(format!("LINE push request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "LINE rejected the channel access token: {} - {}",
                    status, error_text
                )),
                429 => Error::rate_limited(format!(
                    "LINE rate limit exceeded: {} - {}",
                    status, error_text
                )),
                _ => Error::notify(format!("LINE push failed: {} - {}", status, error_text)),
            });
        }

        tracing::debug!("LINE push accepted ({})", status);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "line"
    }
}

/// Truncate to `max_chars` characters, ending with `…` when shortened
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// Factory for [`LineNotifier`]
pub struct LineNotifierFactory;

impl NotifierFactory for LineNotifierFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Line {
                channel_access_token,
            } => Ok(Box::new(LineNotifier::new(channel_access_token.clone())?)),
            other => Err(Error::config(format!(
                "LineNotifierFactory cannot build '{}' notifier",
                other.type_name()
            ))),
        }
    }
}

/// Register the LINE notifier with a registry
pub fn register(registry: &CollaboratorRegistry) {
    registry.register_notifier("line", Box::new(LineNotifierFactory));
}
