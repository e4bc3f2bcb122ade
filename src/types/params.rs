//! String-keyed parameter scope passed into template execution.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::EngineError;

/// Parameters bound into a template's evaluation scope.
///
/// Backed by a `BTreeMap` so serialization order is deterministic; the cache
/// decorator relies on this when deriving keys from serialized parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TemplateParams(BTreeMap<String, Value>);

impl TemplateParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Look up a dotted path (`user.name`) through nested objects.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Overlay `other` on top of `self`; keys in `other` win.
    pub fn merged_with(&self, other: &TemplateParams) -> TemplateParams {
        let mut merged = self.0.clone();
        for (k, v) in &other.0 {
            merged.insert(k.clone(), v.clone());
        }
        TemplateParams(merged)
    }

    /// Deterministic serialization, stable across identical inputs.
    pub fn canonical_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl Display for TemplateParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "[{}]", keys.join(", "))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for TemplateParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        TemplateParams(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_later_keys_overwrite_earlier() {
        let base = TemplateParams::new().with("a", 1).with("b", "base");
        let over = TemplateParams::new().with("b", "call").with("c", true);
        let merged = base.merged_with(&over);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!("call")));
        assert_eq!(merged.get("c"), Some(&json!(true)));
    }

    #[test]
    fn canonical_json_is_order_independent() {
        let a = TemplateParams::new().with("x", 1).with("y", 2);
        let b = TemplateParams::new().with("y", 2).with("x", 1);
        assert_eq!(a.canonical_json().unwrap(), b.canonical_json().unwrap());
    }

    #[test]
    fn lookup_walks_nested_objects() {
        let params = TemplateParams::new().with("user", json!({"name": "alice", "id": 7}));
        assert_eq!(params.lookup("user.name"), Some(&json!("alice")));
        assert_eq!(params.lookup("user.missing"), None);
        assert_eq!(params.lookup("user"), Some(&json!({"name": "alice", "id": 7})));
    }
}
