//! Key/value tags attached to remote resources

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single key/value tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Set of tags on one resource; keys are unique
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Tags from `desired` that are absent here or carry a different value
    pub fn missing_from(&self, desired: &TagSet) -> TagSet {
        desired
            .iter()
            .filter(|(k, v)| self.0.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Merge `other` into self; values in `other` win
    pub fn extend(&mut self, other: &TagSet) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl FromIterator<(String, String)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for TagSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<Tag> for TagSet {
    fn from(tag: Tag) -> Self {
        TagSet::new().with(tag.key, tag.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_from() {
        let current = TagSet::new().with("a", "1").with("b", "2");
        let desired = TagSet::new().with("a", "1").with("b", "3").with("c", "4");

        let missing = current.missing_from(&desired);
        assert_eq!(missing.len(), 2);
        assert_eq!(missing.get("b"), Some("3"));
        assert_eq!(missing.get("c"), Some("4"));
        assert!(current.missing_from(&current).is_empty());
    }

    #[test]
    fn test_serializes_as_map() {
        let tags = TagSet::new().with("create_by_CAPC", "");
        let json = serde_json::to_string(&tags).unwrap();
        assert_eq!(json, r#"{"create_by_CAPC":""}"#);
    }
}
