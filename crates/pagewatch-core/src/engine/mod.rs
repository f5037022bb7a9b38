//! Core watch engine
//!
//! The WatchEngine is responsible for:
//! - Acquiring each target's text via the matching TextAcquirer
//! - Evaluating keywords and deciding availability
//! - Advancing the per-target state machine
//! - Collecting transition messages for a single batched report
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────┐
//!   StateMap (in) ───▶│ WatchEngine  │───▶ RunResult (transitions, StateMap out)
//!                     └──────────────┘
//!                            │
//!         ┌──────────────────┼──────────────────┐
//!         ▼                  ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ TextAcquirer │   │ watch::update│   │   Events    │
//! │ (per engine) │   │ (pure)       │   │ (observe)   │
//! └──────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Targets are processed one at a time in declaration order
//! 2. Acquire → evaluate → decide → update
//! 3. A failed or not-ready acquisition keeps the previous record
//! 4. Records of targets no longer configured are carried through untouched
//!
//! The engine never touches the state store or the notifier; see [`Watcher`]
//! for the full load → run → save → notify cycle.

pub mod watcher;

pub use watcher::{CommittedRun, CycleReport, Watcher};

use crate::config::{AcquisitionEngine, TargetConfig, WatchConfig};
use crate::error::{Error, Result};
use crate::traits::{AcquireRequest, PageText, TextAcquirer};
use crate::watch::{self, AcquisitionOutcome, StateMap, Status, Transition, TransitionKind, Verdict};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the WatchEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Run started
    RunStarted {
        targets_count: usize,
    },

    /// A reading was taken and evaluated
    TargetObserved {
        target_name: String,
        verdict: Verdict,
        status: Status,
    },

    /// No reading this run; the previous record was kept
    TargetHeld {
        target_name: String,
        reason: HoldReason,
    },

    /// Resolved status flipped
    TransitionDetected {
        target_name: String,
        kind: TransitionKind,
    },

    /// Run finished
    RunFinished {
        stats: RunStats,
    },
}

/// Why a target produced no reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldReason {
    /// Hard acquisition failure
    Failed(String),
    /// Page not ready or empty
    NotReady(String),
    /// Target disabled in configuration
    Disabled,
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Targets that produced a reading
    pub observed: usize,
    /// Targets held because acquisition failed
    pub held_failed: usize,
    /// Targets held because the page was not ready
    pub held_not_ready: usize,
    /// Targets skipped because they are disabled
    pub skipped_disabled: usize,
    /// Status transitions detected
    pub transitions: usize,
}

/// Result of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Transitions in target declaration order
    pub transitions: Vec<Transition>,
    /// Full updated state map, to be persisted
    pub states: StateMap,
    /// Counters for the end-of-run log line
    pub stats: RunStats,
}

impl RunResult {
    /// Transition message texts in target order
    pub fn messages(&self) -> Vec<String> {
        self.transitions.iter().map(Transition::message).collect()
    }
}

/// Core watch engine
///
/// ## Lifecycle
///
/// 1. Create with [`WatchEngine::new()`]
/// 2. Call [`WatchEngine::run_once()`] with the loaded state map
/// 3. Call [`WatchEngine::shutdown()`] to release browser resources
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When it is full, events are dropped
/// with a warning and the run continues.
pub struct WatchEngine {
    /// Monitored targets, in declaration order
    targets: Vec<TargetConfig>,

    /// One acquirer per engine kind
    acquirers: HashMap<AcquisitionEngine, Box<dyn TextAcquirer>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<WatchEvent>,
}

impl WatchEngine {
    /// Create a new watch engine
    ///
    /// # Parameters
    ///
    /// - `config`: Watch configuration
    /// - `acquirers`: Acquirer implementations; later entries replace earlier
    ///   ones serving the same engine kind
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields watch events.
    /// Fails if the configuration is invalid or an enabled target uses an
    /// engine kind no acquirer serves.
    pub fn new(
        config: WatchConfig,
        acquirers: Vec<Box<dyn TextAcquirer>>,
    ) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        config.validate()?;

        let acquirers: HashMap<_, _> = acquirers
            .into_iter()
            .map(|acquirer| (acquirer.engine(), acquirer))
            .collect();

        if let Some(target) = config
            .enabled_targets()
            .find(|t| !acquirers.contains_key(&t.engine))
        {
            return Err(Error::config(format!(
                "No acquirer available for the {} engine (target {})",
                target.engine, target.name
            )));
        }

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            targets: config.targets,
            acquirers,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Configured targets
    pub fn targets(&self) -> &[TargetConfig] {
        &self.targets
    }

    /// Run one pass over all targets
    ///
    /// # Parameters
    ///
    /// - `states`: State map loaded from the store; owned by the engine for
    ///   the duration of the run
    ///
    /// # Returns
    ///
    /// Transitions and the updated state map. Per-target failures never fail
    /// the run.
    pub async fn run_once(&self, mut states: StateMap) -> RunResult {
        self.emit_event(WatchEvent::RunStarted {
            targets_count: self.targets.len(),
        });

        let mut transitions = Vec::new();
        let mut stats = RunStats::default();

        for target in &self.targets {
            if !target.enabled {
                debug!("Target {} is disabled, skipping", target.name);
                stats.skipped_disabled += 1;
                self.emit_event(WatchEvent::TargetHeld {
                    target_name: target.name.clone(),
                    reason: HoldReason::Disabled,
                });
                continue;
            }

            let id = target.id();
            let outcome = self.acquire(target).await;

            match &outcome {
                AcquisitionOutcome::Text(_) => stats.observed += 1,
                AcquisitionOutcome::Failed { error } => {
                    stats.held_failed += 1;
                    self.emit_event(WatchEvent::TargetHeld {
                        target_name: target.name.clone(),
                        reason: HoldReason::Failed(error.clone()),
                    });
                }
                AcquisitionOutcome::NotReady { reason } => {
                    stats.held_not_ready += 1;
                    self.emit_event(WatchEvent::TargetHeld {
                        target_name: target.name.clone(),
                        reason: HoldReason::NotReady(reason.clone()),
                    });
                }
            }

            let update = watch::update(target, states.get(&id), &outcome);

            if let (Some(verdict), Some(state)) = (update.verdict, &update.state) {
                debug!(
                    "Target {} [{}]: verdict {:?}, status {}",
                    target.name, id, verdict, state.status
                );
                self.emit_event(WatchEvent::TargetObserved {
                    target_name: target.name.clone(),
                    verdict,
                    status: state.status,
                });
            }

            if let Some(state) = update.state {
                states.insert(id, state);
            }

            if let Some(transition) = update.transition {
                info!(
                    "Target {} changed: {:?}",
                    transition.target_name, transition.kind
                );
                self.emit_event(WatchEvent::TransitionDetected {
                    target_name: transition.target_name.clone(),
                    kind: transition.kind,
                });
                stats.transitions += 1;
                transitions.push(transition);
            }
        }

        info!(
            "Run finished: {} observed, {} failed, {} not ready, {} disabled, {} transitions",
            stats.observed,
            stats.held_failed,
            stats.held_not_ready,
            stats.skipped_disabled,
            stats.transitions
        );
        self.emit_event(WatchEvent::RunFinished { stats });

        RunResult {
            transitions,
            states,
            stats,
        }
    }

    /// Acquire one target's text, folding every failure into an outcome
    async fn acquire(&self, target: &TargetConfig) -> AcquisitionOutcome {
        let Some(acquirer) = self.acquirers.get(&target.engine) else {
            // new() rejects configs that reach this
            return AcquisitionOutcome::Failed {
                error: format!("no acquirer for the {} engine", target.engine),
            };
        };

        match acquirer.acquire(&AcquireRequest::for_target(target)).await {
            Ok(PageText::Text(text)) => AcquisitionOutcome::Text(text),
            Ok(PageText::Unknown { reason }) => {
                info!("Target {} not ready: {}", target.name, reason);
                AcquisitionOutcome::NotReady { reason }
            }
            Err(e) => {
                error!("Fetch failed for {} ({}): {}", target.name, target.url, e);
                AcquisitionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Release acquirer resources (browser processes)
    ///
    /// Errors are logged; shutdown always visits every acquirer.
    pub async fn shutdown(&self) {
        for (engine, acquirer) in &self.acquirers {
            if let Err(e) = acquirer.shutdown().await {
                warn!("Failed to shut down {} acquirer: {}", engine, e);
            }
        }
    }

    /// Emit a watch event
    fn emit_event(&self, event: WatchEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
