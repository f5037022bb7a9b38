//! Report delivery helpers
//!
//! [`broadcast`] sends one body to every recipient, best effort: a failed
//! delivery is logged and the loop moves on. Nothing is retried.

pub mod report;

pub use report::{format_report, format_report_now};

use async_trait::async_trait;
use std::collections::HashSet;
use tracing::{error, info};

use crate::traits::Notifier;

/// Outcome of a broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients the body reached
    pub delivered: Vec<String>,
    /// Recipients that failed, with the error text
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deliver `body` to each recipient in order
pub async fn broadcast(
    notifier: &dyn Notifier,
    recipients: &[String],
    body: &str,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for recipient in recipients {
        match notifier.deliver(recipient, body).await {
            Ok(()) => report.delivered.push(recipient.clone()),
            Err(e) => {
                error!(
                    "{} delivery to {} failed: {}",
                    notifier.notifier_name(),
                    mask_recipient(recipient),
                    e
                );
                report.failed.push((recipient.clone(), e.to_string()));
            }
        }
    }

    info!(
        "Report sent via {}: {} delivered, {} failed",
        notifier.notifier_name(),
        report.delivered.len(),
        report.failed.len()
    );
    report
}

/// Merge a stored recipient list with a supplementary one
///
/// Entries are trimmed, blanks dropped, and duplicates removed keeping the
/// first occurrence.
pub fn merge_recipients<A, B>(stored: A, supplementary: B) -> Vec<String>
where
    A: IntoIterator,
    A::Item: Into<String>,
    B: IntoIterator,
    B::Item: Into<String>,
{
    let mut seen = HashSet::new();
    stored
        .into_iter()
        .map(Into::into)
        .chain(supplementary.into_iter().map(Into::into))
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

/// Split a comma separated recipient list (e.g. from the environment)
pub fn parse_recipient_list(raw: &str) -> Vec<String> {
    merge_recipients(raw.split(','), std::iter::empty::<String>())
}

/// Shorten a recipient identifier for logs
pub fn mask_recipient(recipient: &str) -> String {
    let visible: String = recipient.chars().take(6).collect();
    if visible.len() < recipient.len() {
        format!("{}…", visible)
    } else {
        visible
    }
}

/// Notifier that writes the body to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, recipient: &str, body: &str) -> Result<(), crate::Error> {
        info!("Report for {}:\n{}", mask_recipient(recipient), body);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}

/// Factory for [`LogNotifier`]
pub struct LogNotifierFactory;

impl crate::traits::NotifierFactory for LogNotifierFactory {
    fn create(
        &self,
        _config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn Notifier>, crate::Error> {
        Ok(Box::new(LogNotifier))
    }
}
