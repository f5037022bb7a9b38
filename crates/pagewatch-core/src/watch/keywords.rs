//! Keyword evaluation
//!
//! [`evaluate`] turns a page's visible text and a keyword list into a
//! [`KeywordPresence`] map. Matching is a case-insensitive substring test.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Keyword → presence map
///
/// Entries keep the order in which keywords were declared. Equality compares
/// key/value pairs only, so two maps with the same entries in a different
/// order are equal.
#[derive(Debug, Clone, Default)]
pub struct KeywordPresence {
    entries: Vec<(String, bool)>,
}

impl KeywordPresence {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry; a new keyword is appended at the end
    pub fn insert(&mut self, keyword: impl Into<String>, present: bool) {
        let keyword = keyword.into();
        match self.entries.iter_mut().find(|(k, _)| *k == keyword) {
            Some(entry) => entry.1 = present,
            None => self.entries.push((keyword, present)),
        }
    }

    /// Presence recorded for a keyword
    pub fn get(&self, keyword: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, present)| *present)
    }

    /// Whether any keyword was found
    pub fn any_present(&self) -> bool {
        self.entries.iter().any(|(_, present)| *present)
    }

    /// Keywords that were found, in declaration order
    pub fn present_keywords(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, present)| *present)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Iterate over entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, present)| (k.as_str(), *present))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for KeywordPresence {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, present)| other.get(k) == Some(*present))
    }
}

impl Eq for KeywordPresence {}

impl<K: Into<String>> FromIterator<(K, bool)> for KeywordPresence {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (keyword, present) in iter {
            map.insert(keyword, present);
        }
        map
    }
}

impl Serialize for KeywordPresence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (keyword, present) in &self.entries {
            map.serialize_entry(keyword, present)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for KeywordPresence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PresenceVisitor;

        impl<'de> Visitor<'de> for PresenceVisitor {
            type Value = KeywordPresence;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of keyword to boolean")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = KeywordPresence::new();
                while let Some((keyword, present)) = access.next_entry::<String, bool>()? {
                    map.insert(keyword, present);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(PresenceVisitor)
    }
}

/// Test each keyword against the text, ignoring case
///
/// An empty keyword list yields an empty map. A keyword declared twice keeps
/// its first position.
pub fn evaluate<S: AsRef<str>>(text: &str, keywords: &[S]) -> KeywordPresence {
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .map(|keyword| {
            let keyword = keyword.as_ref();
            (keyword, haystack.contains(&keyword.to_lowercase()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_keywords_yield_empty_map() {
        let map = evaluate::<&str>("anything at all", &[]);
        assert!(map.is_empty());
    }

    #[test]
    fn test_case_insensitive_match() {
        let map = evaluate("FOO bar", &["foo"]);
        assert_eq!(map, [("foo", true)].into_iter().collect());
    }

    #[test]
    fn test_non_ascii_keywords() {
        let map = evaluate("現在 空室 があります", &["空室", "満室"]);
        assert_eq!(map.get("空室"), Some(true));
        assert_eq!(map.get("満室"), Some(false));
    }

    #[test]
    fn test_declaration_order_preserved() {
        let map = evaluate("b c", &["c", "a", "b"]);
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(map.present_keywords(), vec!["c", "b"]);
    }

    #[test]
    fn test_equality_ignores_order() {
        let left: KeywordPresence = [("a", true), ("b", false)].into_iter().collect();
        let right: KeywordPresence = [("b", false), ("a", true)].into_iter().collect();
        let different: KeywordPresence = [("a", true), ("b", true)].into_iter().collect();

        assert_eq!(left, right);
        assert_ne!(left, different);
    }

    #[test]
    fn test_duplicate_keyword_keeps_first_position() {
        let map = evaluate("x", &["x", "y", "x"]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().next(), Some(("x", true)));
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let map: KeywordPresence = [("z", true), ("a", false)].into_iter().collect();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"z":true,"a":false}"#);

        let back: KeywordPresence = serde_json::from_str(&json).unwrap();
        assert_eq!(back.iter().next(), Some(("z", true)));
    }
}
