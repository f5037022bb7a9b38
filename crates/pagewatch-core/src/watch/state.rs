//! Persisted per-target state
//!
//! One [`TargetState`] is kept per [`TargetId`]. Records written before the
//! `status` field existed load with [`Status::Unset`].

use super::decision::Verdict;
use super::keywords::KeywordPresence;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Length of a target identity in hex characters
pub const TARGET_ID_LEN: usize = 16;

/// Full persisted state, keyed by target identity
pub type StateMap = BTreeMap<TargetId, TargetState>;

/// Stable identity of a target, derived from its name and URL
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Hash `name|url` and keep the first [`TARGET_ID_LEN`] hex characters
    pub fn derive(name: &str, url: &str) -> Self {
        let digest = Sha256::digest(format!("{}|{}", name, url).as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(TARGET_ID_LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved availability at rest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No conclusive observation yet
    #[default]
    Unset,
    Available,
    Unavailable,
}

impl Status {
    /// Status a conclusive verdict resolves to
    pub fn from_verdict(verdict: Verdict) -> Option<Self> {
        match verdict {
            Verdict::Available => Some(Status::Available),
            Verdict::Unavailable => Some(Status::Unavailable),
            Verdict::Indeterminate => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Status::Unset)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Unset => "unset",
            Status::Available => "available",
            Status::Unavailable => "unavailable",
        })
    }
}

/// Last observation of a target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    /// Appear keyword presence at the last reading
    #[serde(default)]
    pub appear: KeywordPresence,

    /// Vanish keyword presence at the last reading
    #[serde(default)]
    pub vanish: KeywordPresence,

    /// Last resolved status
    #[serde(default)]
    pub status: Status,
}

impl TargetState {
    pub fn new(appear: KeywordPresence, vanish: KeywordPresence, status: Status) -> Self {
        Self {
            appear,
            vanish,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id_is_stable_and_short() {
        let a = TargetId::derive("Example Heights", "https://example.com/1");
        let b = TargetId::derive("Example Heights", "https://example.com/1");
        let c = TargetId::derive("Example Heights", "https://example.com/2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), TARGET_ID_LEN);
        assert!(a.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_legacy_record_loads_unset() {
        let json = r#"{"appear": {"vacancy": false}, "vanish": {"full": true}}"#;
        let state: TargetState = serde_json::from_str(json).unwrap();
        assert_eq!(state.status, Status::Unset);
        assert_eq!(state.vanish.get("full"), Some(true));
    }

    #[test]
    fn test_status_round_trips_as_snake_case() {
        let state = TargetState::new(KeywordPresence::new(), KeywordPresence::new(), Status::Available);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "available");
    }

    #[test]
    fn test_status_from_verdict() {
        assert_eq!(Status::from_verdict(Verdict::Available), Some(Status::Available));
        assert_eq!(Status::from_verdict(Verdict::Unavailable), Some(Status::Unavailable));
        assert_eq!(Status::from_verdict(Verdict::Indeterminate), None);
    }
}
