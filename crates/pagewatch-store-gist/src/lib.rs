// # GitHub Gist State Store
//
// This crate keeps the watcher's state (and its recipient list) in a single
// GitHub Gist, so stateless one-shot runners can share it between runs.
//
// ## Documents
//
// - `state.json` (configurable): the [`StateMap`] as pretty-printed JSON
// - `recipients.json`: a JSON array of recipient identifiers
//
// A file that is missing, or whose content does not parse, reads as empty.
// Files the API returns truncated are fetched in full from their `raw_url`.
// Transport errors and non-success statuses are state store failures, which
// abort the cycle before anything is notified.
//
// ## Security Requirements
//
// - The token NEVER appears in logs or Debug output
//
// ## API Reference
//
// - Get a gist: GET `/gists/:gist_id`
// - Update a gist: PATCH `/gists/:gist_id` with `{"files": {name: {"content": ...}}}`

use async_trait::async_trait;
use pagewatch_core::config::StateStoreConfig;
use pagewatch_core::notify::merge_recipients;
use pagewatch_core::registry::CollaboratorRegistry;
use pagewatch_core::traits::{RecipientSource, StateStore, StateStoreFactory};
use pagewatch_core::watch::StateMap;
use pagewatch_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// GitHub API base URL
const GITHUB_API_BASE: &str = "https://api.github.com";

/// HTTP timeout for gist requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENT: &str = concat!("pagewatch/", env!("CARGO_PKG_VERSION"));

/// Gist file holding the recipient list
pub const RECIPIENTS_FILE: &str = "recipients.json";

#[derive(Debug, Deserialize)]
struct GistDocument {
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

/// Minimal client for one gist
#[derive(Clone)]
pub struct GistClient {
    gist_id: String,
    /// ⚠️ NEVER log this value
    token: String,
    api_base: String,
    client: reqwest::Client,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for GistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GistClient")
            .field("gist_id", &self.gist_id)
            .field("token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GistClient {
    /// Create a client for `gist_id`
    pub fn new(gist_id: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let gist_id = gist_id.into();
        let token = token.into();
        if gist_id.trim().is_empty() {
            return Err(Error::config("Gist ID cannot be empty"));
        }
        if token.trim().is_empty() {
            return Err(Error::config("Gist token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            gist_id,
            token,
            api_base: GITHUB_API_BASE.to_string(),
            client,
        })
    }

    /// Point the client at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self) -> String {
        format!("{}/gists/{}", self.api_base, self.gist_id)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url())
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    /// Raw content of one file, `None` when the gist has no such file
    pub async fn read_file(&self, file_name: &str) -> Result<Option<String>> {
        let response = self
            .request(reqwest::Method::GET)
            .send()
            .await
            .map_err(|e| Error::state_store(format!("Gist request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::state_store(format!(
                "Gist read failed: {} - {}",
                status, error_text
            )));
        }

        let mut document: GistDocument = response
            .json()
            .await
            .map_err(|e| Error::state_store(format!("Failed to parse gist response: {}", e)))?;

        match document.files.remove(file_name) {
            Some(file) if file.truncated => self.read_raw(file_name, file.raw_url).await.map(Some),
            Some(file) => Ok(file.content),
            None => Ok(None),
        }
    }

    /// Full content of a file the gist API returned truncated
    async fn read_raw(&self, file_name: &str, raw_url: Option<String>) -> Result<String> {
        let raw_url = raw_url.ok_or_else(|| {
            Error::state_store(format!(
                "Gist file {} is truncated and has no raw_url",
                file_name
            ))
        })?;
        tracing::debug!("Gist file {} is truncated, fetching raw content", file_name);

        let response = self
            .client
            .get(&raw_url)
            .send()
            .await
            .map_err(|e| Error::state_store(format!("Gist raw request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::state_store(format!(
                "Gist raw read of {} failed: {}",
                file_name, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::state_store(format!("Failed to read raw gist file: {}", e)))
    }

    /// Parsed content of one file, `None` when missing or unparsable
    pub async fn read_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<Option<T>> {
        let Some(content) = self.read_file(file_name).await? else {
            tracing::debug!("Gist file {} not found", file_name);
            return Ok(None);
        };

        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Gist file {} is not valid JSON ({}); treating as empty", file_name, e);
                Ok(None)
            }
        }
    }

    /// Replace the content of one file
    pub async fn write_file(&self, file_name: &str, content: String) -> Result<()> {
        let payload = serde_json::json!({
            "files": { file_name: { "content": content } }
        });

        let response = self
            .request(reqwest::Method::PATCH)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::state_store(format!("Gist request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::state_store(format!(
                "Gist update failed: {} - {}",
                status, error_text
            )));
        }
        Ok(())
    }
}

/// State store backed by one gist file
#[derive(Debug, Clone)]
pub struct GistStateStore {
    client: Arc<GistClient>,
    file_name: String,
}

impl GistStateStore {
    pub fn new(client: Arc<GistClient>, file_name: impl Into<String>) -> Self {
        Self {
            client,
            file_name: file_name.into(),
        }
    }
}

#[async_trait]
impl StateStore for GistStateStore {
    async fn load(&self) -> Result<StateMap> {
        let states: StateMap = self
            .client
            .read_json(&self.file_name)
            .await?
            .unwrap_or_default();
        tracing::debug!("Loaded {} target records from gist", states.len());
        Ok(states)
    }

    async fn save(&self, states: &StateMap) -> Result<()> {
        let content = serde_json::to_string_pretty(states)?;
        self.client.write_file(&self.file_name, content).await?;
        tracing::debug!("Saved {} target records to gist", states.len());
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "gist"
    }
}

/// Recipient list stored in the gist, merged with a supplementary list
#[derive(Debug, Clone)]
pub struct GistRecipientSource {
    client: Arc<GistClient>,
    supplementary: Vec<String>,
}

impl GistRecipientSource {
    pub fn new<I, S>(client: Arc<GistClient>, supplementary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client,
            supplementary: supplementary.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl RecipientSource for GistRecipientSource {
    async fn recipients(&self) -> Result<Vec<String>> {
        let stored: Vec<String> = self
            .client
            .read_json(RECIPIENTS_FILE)
            .await?
            .unwrap_or_default();
        Ok(merge_recipients(stored, self.supplementary.iter().cloned()))
    }
}

/// Factory for [`GistStateStore`]
pub struct GistStateStoreFactory;

#[async_trait]
impl StateStoreFactory for GistStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        match config {
            StateStoreConfig::Gist {
                gist_id,
                token,
                file_name,
            } => {
                let client = GistClient::new(gist_id.clone(), token.clone())?;
                Ok(Box::new(GistStateStore::new(Arc::new(client), file_name.clone())))
            }
            other => Err(Error::config(format!(
                "GistStateStoreFactory cannot build '{}' store",
                other.type_name()
            ))),
        }
    }
}

/// Register the gist state store with a registry
pub fn register(registry: &CollaboratorRegistry) {
    registry.register_state_store("gist", Box::new(GistStateStoreFactory));
}
