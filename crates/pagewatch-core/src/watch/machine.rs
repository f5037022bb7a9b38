//! Per-target state machine
//!
//! ```text
//!            conclusive (silent)              conclusive, differs (message)
//!   Unset ───────────────────────▶ Available ◀──────────────────────────▶ Unavailable
//!     │                              │  ▲                                   │  ▲
//!     └─ indeterminate: record       └──┘ indeterminate / same verdict      └──┘
//!        created, still Unset            (status kept, no message)
//! ```
//!
//! A failed or not-ready acquisition never touches the record.

use super::decision::{Verdict, decide};
use super::keywords::evaluate;
use super::state::{Status, TargetState};
use crate::config::TargetConfig;

/// What the acquirer produced for one target this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// Visible text was read
    Text(String),
    /// The page rendered too slowly or stayed empty; expected and transient
    NotReady {
        /// Diagnostic detail
        reason: String,
    },
    /// The page could not be observed at all
    Failed {
        /// Diagnostic detail
        error: String,
    },
}

/// Direction of a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    BecameAvailable,
    BecameUnavailable,
}

impl TransitionKind {
    fn headline(&self) -> &'static str {
        match self {
            TransitionKind::BecameAvailable => "became available",
            TransitionKind::BecameUnavailable => "returned to unavailable",
        }
    }
}

/// A notifiable change of resolved status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target_name: String,
    pub url: String,
    pub kind: TransitionKind,
    /// Keywords that fired for the new status
    pub keywords: Vec<String>,
}

impl Transition {
    /// Message text, headed by the target name and URL
    pub fn message(&self) -> String {
        let mut lines = vec![
            format!("[Status change] {}", self.target_name),
            self.url.clone(),
            format!("Now: {}", self.kind.headline()),
        ];
        if !self.keywords.is_empty() {
            lines.push(format!("Matched: {}", self.keywords.join(", ")));
        }
        lines.join("\n")
    }
}

/// Result of feeding one outcome to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Record to persist; `None` only when there was no prior record and nothing was read
    pub state: Option<TargetState>,
    /// Status change to notify about
    pub transition: Option<Transition>,
    /// Verdict of this reading, when text was read
    pub verdict: Option<Verdict>,
}

/// Combine a fresh acquisition outcome with the previous record
pub fn update(
    target: &TargetConfig,
    previous: Option<&TargetState>,
    outcome: &AcquisitionOutcome,
) -> Update {
    let text = match outcome {
        AcquisitionOutcome::Text(text) => text,
        AcquisitionOutcome::NotReady { .. } | AcquisitionOutcome::Failed { .. } => {
            return Update {
                state: previous.cloned(),
                transition: None,
                verdict: None,
            };
        }
    };

    let appear = evaluate(text, &target.appear_keywords);
    let vanish = evaluate(text, &target.vanish_keywords);
    let verdict = decide(&appear, &vanish);
    let previous_status = previous.map(|s| s.status).unwrap_or_default();

    let (status, transition) = match Status::from_verdict(verdict) {
        // Hysteresis: an inconclusive reading never moves the status
        None => (previous_status, None),
        Some(resolved) if !previous_status.is_set() => (resolved, None),
        Some(resolved) if resolved == previous_status => (resolved, None),
        Some(resolved) => {
            let (kind, fired) = match resolved {
                Status::Available => (TransitionKind::BecameAvailable, &appear),
                _ => (TransitionKind::BecameUnavailable, &vanish),
            };
            let transition = Transition {
                target_name: target.name.clone(),
                url: target.url.clone(),
                kind,
                keywords: fired
                    .present_keywords()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            };
            (resolved, Some(transition))
        }
    };

    Update {
        state: Some(TargetState::new(appear, vanish, status)),
        transition,
        verdict: Some(verdict),
    }
}
