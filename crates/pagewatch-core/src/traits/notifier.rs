// # Notifier Trait
//
// Defines the interface for pushing the batched watch report to recipients.
//
// ## Implementations
//
// - LINE Messaging API: `pagewatch-notify-line` crate
// - Log only: [`crate::notify::LogNotifier`]
//
// Recipients come from a [`RecipientSource`]. Fan-out over recipients is
// done by [`crate::notify::broadcast`], never by the notifier itself.

use async_trait::async_trait;

/// Trait for notifier implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoint only
/// - ✅ Return success or failure for a single recipient
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed delivery is logged and dropped)
/// - ❌ Access the state store
/// - ❌ Iterate recipients (owned by `broadcast`)
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message body to one recipient
    ///
    /// # Parameters
    ///
    /// - `recipient`: Recipient identifier (e.g. a LINE user ID)
    /// - `body`: Full message text
    async fn deliver(&self, recipient: &str, body: &str) -> Result<(), crate::Error>;

    /// Notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Source of the ordered recipient list
#[async_trait]
pub trait RecipientSource: Send + Sync {
    /// Ordered, de-duplicated recipient identifiers
    ///
    /// A failure here is treated like a state store failure: the run is
    /// aborted before state is committed, so no alert is lost.
    async fn recipients(&self) -> Result<Vec<String>, crate::Error>;
}

/// Fixed recipient list (environment-provided or tests)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticRecipients {
    recipients: Vec<String>,
}

impl StaticRecipients {
    pub fn new<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recipients: crate::notify::merge_recipients(
                recipients.into_iter().map(Into::into),
                std::iter::empty::<String>(),
            ),
        }
    }
}

#[async_trait]
impl RecipientSource for StaticRecipients {
    async fn recipients(&self) -> Result<Vec<String>, crate::Error> {
        Ok(self.recipients.clone())
    }
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error>;
}
