//! Configuration types for the pagewatch system
//!
//! This module defines all configuration structures used throughout the crate.
//! Target lists are written in YAML, either as a bare list of targets or as a
//! document with `targets:` and an optional `engine:` section.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::watch::TargetId;

/// Main watch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Monitored pages, in declaration order
    pub targets: Vec<TargetConfig>,

    /// Optional acquisition/engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Accepted shapes of a targets file
#[derive(Deserialize)]
#[serde(untagged)]
enum TargetsDocument {
    List(Vec<TargetConfig>),
    Full(WatchConfig),
}

impl WatchConfig {
    /// Create a configuration from a list of targets with default engine settings
    pub fn new(targets: Vec<TargetConfig>) -> Self {
        Self {
            targets,
            engine: EngineConfig::default(),
        }
    }

    /// Parse a targets document from YAML
    pub fn from_yaml_str(content: &str) -> Result<Self, crate::Error> {
        let document: TargetsDocument = serde_yaml::from_str(content)?;
        Ok(match document {
            TargetsDocument::List(targets) => Self::new(targets),
            TargetsDocument::Full(config) => config,
        })
    }

    /// Load a targets document from a YAML file
    pub async fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            crate::Error::config(format!(
                "Failed to read targets file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.targets.is_empty() {
            return Err(crate::Error::config("No targets configured"));
        }

        let mut ids = HashSet::new();
        for target in &self.targets {
            target.validate()?;
            if !ids.insert(target.id()) {
                return Err(crate::Error::config(format!(
                    "Duplicate target: {} ({})",
                    target.name, target.url
                )));
            }
        }

        self.engine.validate()
    }

    /// Targets that take part in a run
    pub fn enabled_targets(&self) -> impl Iterator<Item = &TargetConfig> {
        self.targets.iter().filter(|t| t.enabled)
    }
}

/// How a target's text is acquired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionEngine {
    /// Single HTTP GET, markup stripped locally
    #[default]
    Static,
    /// Headless browser with readiness gating and retry
    Rendered,
}

impl AcquisitionEngine {
    /// Name used in logs and the registry
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionEngine::Static => "static",
            AcquisitionEngine::Rendered => "rendered",
        }
    }
}

impl std::fmt::Display for AcquisitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Display name, also part of the state identity
    pub name: String,

    /// Page URL, also part of the state identity
    pub url: String,

    /// CSS selector restricting the text that is inspected
    #[serde(default)]
    pub scope_selector: Option<String>,

    /// Terms whose presence signals availability
    #[serde(default, deserialize_with = "null_as_empty")]
    pub appear_keywords: Vec<String>,

    /// Terms whose presence signals unavailability
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vanish_keywords: Vec<String>,

    /// Acquisition engine
    #[serde(default)]
    pub engine: AcquisitionEngine,

    /// Element whose visibility gates text sampling (rendered engine only)
    #[serde(default)]
    pub ready_selector: Option<String>,

    /// Whether this target is watched
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl TargetConfig {
    /// Create a new static-engine target with no keywords
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            scope_selector: None,
            appear_keywords: Vec::new(),
            vanish_keywords: Vec::new(),
            engine: AcquisitionEngine::Static,
            ready_selector: None,
            enabled: true,
        }
    }

    /// Set the scope selector
    pub fn with_scope_selector(mut self, selector: impl Into<String>) -> Self {
        self.scope_selector = Some(selector.into());
        self
    }

    /// Set the appear keywords
    pub fn with_appear_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.appear_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the vanish keywords
    pub fn with_vanish_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vanish_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the acquisition engine
    pub fn with_engine(mut self, engine: AcquisitionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Set the readiness selector
    pub fn with_ready_selector(mut self, selector: impl Into<String>) -> Self {
        self.ready_selector = Some(selector.into());
        self
    }

    /// Enable or disable the target
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// State identity derived from `(name, url)`
    pub fn id(&self) -> TargetId {
        TargetId::derive(&self.name, &self.url)
    }

    /// Scope selector, with blank values treated as absent
    pub fn scope(&self) -> Option<&str> {
        non_blank(self.scope_selector.as_deref())
    }

    /// Readiness selector, with blank values treated as absent
    pub fn ready(&self) -> Option<&str> {
        non_blank(self.ready_selector.as_deref())
    }

    /// Validate a single target
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::config("Target name cannot be empty"));
        }
        if self.url.trim().is_empty() {
            return Err(crate::Error::config(format!(
                "Target {} has an empty URL",
                self.name
            )));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Target {} URL must use HTTP or HTTPS scheme. Got: {}",
                self.name, self.url
            )));
        }
        if self
            .appear_keywords
            .iter()
            .chain(&self.vanish_keywords)
            .any(|k| k.is_empty())
        {
            return Err(crate::Error::config(format!(
                "Target {} has an empty keyword",
                self.name
            )));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_enabled() -> bool {
    true
}

/// Engine configuration (timeouts and retry policy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// User agent sent by the static engine
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Static GET timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Browser navigation timeout (in seconds)
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Best-effort wait for network quiescence (in seconds)
    #[serde(default = "default_network_idle_timeout_secs")]
    pub network_idle_timeout_secs: u64,

    /// Wait for the readiness anchor to become visible (in seconds)
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Deadline for the text anchor to yield non-empty text (in seconds)
    #[serde(default = "default_text_deadline_secs")]
    pub text_deadline_secs: u64,

    /// Sampling interval for readiness and text polling (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Attempt ceiling for the rendered engine
    #[serde(default = "default_max_render_attempts")]
    pub max_render_attempts: usize,

    /// First backoff delay between rendered attempts; doubles every attempt (in seconds)
    #[serde(default = "default_render_backoff_base_secs")]
    pub render_backoff_base_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.user_agent.trim().is_empty() {
            return Err(crate::Error::config("User agent cannot be empty"));
        }
        for (name, value) in [
            ("request_timeout_secs", self.request_timeout_secs),
            ("navigation_timeout_secs", self.navigation_timeout_secs),
            ("ready_timeout_secs", self.ready_timeout_secs),
            ("text_deadline_secs", self.text_deadline_secs),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(crate::Error::config(format!("{} must be > 0", name)));
            }
        }
        if !(1..=10).contains(&self.max_render_attempts) {
            return Err(crate::Error::config(format!(
                "max_render_attempts must be between 1 and 10. Got: {}",
                self.max_render_attempts
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn network_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.network_idle_timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn text_deadline(&self) -> Duration {
        Duration::from_secs(self.text_deadline_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn render_backoff_base(&self) -> Duration {
        Duration::from_secs(self.render_backoff_base_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            network_idle_timeout_secs: default_network_idle_timeout_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
            text_deadline_secs: default_text_deadline_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_render_attempts: default_max_render_attempts(),
            render_backoff_base_secs: default_render_backoff_base_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; pagewatch/{})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_network_idle_timeout_secs() -> u64 {
    10
}

fn default_ready_timeout_secs() -> u64 {
    15
}

fn default_text_deadline_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_render_attempts() -> usize {
    3
}

fn default_render_backoff_base_secs() -> u64 {
    2
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// State store configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// GitHub Gist document store
    Gist {
        /// Gist identifier
        gist_id: String,
        /// Personal access token with gist scope
        token: String,
        /// File inside the gist holding the state
        #[serde(default = "default_gist_state_file")]
        file_name: String,
    },
}

impl StateStoreConfig {
    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Gist { .. } => "gist",
        }
    }

    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            StateStoreConfig::Gist { gist_id, token, .. } => {
                if gist_id.is_empty() {
                    return Err(crate::Error::config("Gist ID cannot be empty"));
                }
                if token.is_empty() {
                    return Err(crate::Error::config("Gist token cannot be empty"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn default_gist_state_file() -> String {
    "state.json".to_string()
}

// Tokens must never reach logs
impl std::fmt::Debug for StateStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateStoreConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            StateStoreConfig::Memory => f.write_str("Memory"),
            StateStoreConfig::Gist {
                gist_id, file_name, ..
            } => f
                .debug_struct("Gist")
                .field("gist_id", gist_id)
                .field("token", &"<REDACTED>")
                .field("file_name", file_name)
                .finish(),
        }
    }
}

/// Notifier configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// LINE Messaging API push
    Line {
        /// Channel access token
        channel_access_token: String,
    },

    /// Write reports to the log only
    #[default]
    Log,
}

impl NotifierConfig {
    /// Get the notifier type name
    pub fn type_name(&self) -> &'static str {
        match self {
            NotifierConfig::Line { .. } => "line",
            NotifierConfig::Log => "log",
        }
    }

    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Line {
                channel_access_token,
            } if channel_access_token.is_empty() => Err(crate::Error::config(
                "LINE channel access token cannot be empty",
            )),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierConfig::Line { .. } => f
                .debug_struct("Line")
                .field("channel_access_token", &"<REDACTED>")
                .finish(),
            NotifierConfig::Log => f.write_str("Log"),
        }
    }
}
