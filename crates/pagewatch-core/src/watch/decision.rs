//! Availability decision
//!
//! Appear keywords are checked before vanish keywords: while a page is
//! switching over, both sets can briefly be visible and the more specific
//! "space appeared" signal wins.

use super::keywords::KeywordPresence;
use serde::{Deserialize, Serialize};

/// Verdict for a single reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// At least one appear keyword is present
    Available,
    /// No appear keyword, at least one vanish keyword
    Unavailable,
    /// Neither signal fired
    Indeterminate,
}

impl Verdict {
    /// Whether the verdict may change the resolved status
    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Verdict::Indeterminate)
    }
}

/// Decide availability from the two presence maps
pub fn decide(appear: &KeywordPresence, vanish: &KeywordPresence) -> Verdict {
    if appear.any_present() {
        Verdict::Available
    } else if vanish.any_present() {
        Verdict::Unavailable
    } else {
        Verdict::Indeterminate
    }
}
