//! One full watch cycle
//!
//! ```text
//! recipients ─▶ load ─▶ WatchEngine::run_once ─▶ save ─▶ notify
//! ```
//!
//! Any failure before or during `save` aborts the cycle, so a report is only
//! sent for state that was committed. Notification failures are logged and
//! never undo the commit.
//!
//! The cycle is split at the commit: [`Watcher::commit_run`] may be abandoned
//! midway, while [`Watcher::notify`] should be driven to completion once the
//! state it reports on has been saved.

use crate::engine::{RunResult, WatchEngine};
use crate::error::Result;
use crate::notify::{DeliveryReport, broadcast, format_report_now};
use crate::traits::{Notifier, RecipientSource, StateStore};
use tracing::{debug, info, warn};

/// What a cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Engine output
    pub run: RunResult,
    /// Whether the state map was written back
    pub saved: bool,
    /// Delivery outcome; `None` when nothing was sent
    pub delivery: Option<DeliveryReport>,
}

/// A run whose state has been committed but not yet reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedRun {
    /// Engine output
    pub run: RunResult,
    /// Whether the state map was written back
    pub saved: bool,
    /// Recipients resolved before the run started
    pub recipients: Vec<String>,
}

/// Wires an engine to its store, recipients and notifier
pub struct Watcher {
    engine: WatchEngine,
    store: Box<dyn StateStore>,
    recipients: Box<dyn RecipientSource>,
    notifier: Box<dyn Notifier>,
    commit: bool,
}

impl Watcher {
    /// Create a watcher that saves state after every run
    pub fn new(
        engine: WatchEngine,
        store: Box<dyn StateStore>,
        recipients: Box<dyn RecipientSource>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            engine,
            store,
            recipients,
            notifier,
            commit: true,
        }
    }

    /// Run without writing state back (dry run)
    pub fn without_commit(mut self) -> Self {
        self.commit = false;
        self
    }

    pub fn engine(&self) -> &WatchEngine {
        &self.engine
    }

    /// Run one cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: state committed (unless dry run) and report sent if needed
    /// - `Err(Error)`: recipient or state store failure; nothing was sent
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let committed = self.commit_run().await?;
        Ok(self.notify(committed).await)
    }

    /// Resolve recipients, load, run the engine and save
    pub async fn commit_run(&self) -> Result<CommittedRun> {
        let recipients = self.recipients.recipients().await?;
        if recipients.is_empty() {
            warn!("No recipients configured; transitions will only be logged");
        }

        let states = self.store.load().await?;
        debug!(
            "Loaded {} records from {} store",
            states.len(),
            self.store.store_name()
        );

        let run = self.engine.run_once(states).await;

        let saved = if self.commit {
            self.store.save(&run.states).await?;
            debug!(
                "Saved {} records to {} store",
                run.states.len(),
                self.store.store_name()
            );
            true
        } else {
            info!("Dry run: state not saved");
            false
        };

        Ok(CommittedRun {
            run,
            saved,
            recipients,
        })
    }

    /// Report the transitions of a committed run
    pub async fn notify(&self, committed: CommittedRun) -> CycleReport {
        let CommittedRun {
            run,
            saved,
            recipients,
        } = committed;

        let delivery = if run.transitions.is_empty() {
            info!("No changes.");
            None
        } else if recipients.is_empty() {
            for message in run.messages() {
                info!("Undelivered transition:\n{}", message);
            }
            None
        } else {
            let body = format_report_now(&run.messages());
            Some(broadcast(self.notifier.as_ref(), &recipients, &body).await)
        };

        CycleReport {
            run,
            saved,
            delivery,
        }
    }

    /// Release engine resources
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }
}
