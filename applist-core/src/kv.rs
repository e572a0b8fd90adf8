//! Nested key-value trees returned by the product-info service.
//!
//! Each product id maps to one tree (`common`, `extended`, `depots`, ...).
//! Keys are matched case-insensitively, the same way the upstream text
//! format treats them. Missing keys are `None` rather than a sentinel node.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvNode {
    /// A leaf string value.
    Value(String),
    /// Named children.
    Children(Vec<(String, KvNode)>),
}

impl Default for KvNode {
    fn default() -> Self {
        Self::Children(Vec::new())
    }
}

impl KvNode {
    pub fn value(s: impl Into<String>) -> Self {
        Self::Value(s.into())
    }

    /// Build a node from `(key, child)` pairs.
    pub fn children<K: Into<String>>(items: impl IntoIterator<Item = (K, KvNode)>) -> Self {
        Self::Children(items.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a direct child by name.
    pub fn get(&self, key: &str) -> Option<&KvNode> {
        match self {
            Self::Children(items) => items
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
            Self::Value(_) => None,
        }
    }

    /// Walk a path of child names, e.g. `["common", "assets", "main_capsule"]`.
    pub fn path(&self, keys: &[&str]) -> Option<&KvNode> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    /// The leaf value of this node, if it is a non-empty leaf.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Non-empty leaf value at `keys`.
    pub fn str_at(&self, keys: &[&str]) -> Option<&str> {
        self.path(keys).and_then(KvNode::as_str)
    }

    /// Direct children; empty for a leaf.
    pub fn entries(&self) -> &[(String, KvNode)] {
        match self {
            Self::Children(items) => items,
            Self::Value(_) => &[],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Convert a JSON document into a tree.
    ///
    /// Objects become children, arrays become children keyed by index,
    /// scalars become leaves (`null` is an empty leaf).
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::Children(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
            Value::Array(items) => Self::Children(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), Self::from_json(v)))
                    .collect(),
            ),
            Value::String(s) => Self::Value(s.clone()),
            Value::Number(n) => Self::Value(n.to_string()),
            Value::Bool(b) => Self::Value(if *b { "1" } else { "0" }.to_string()),
            Value::Null => Self::Value(String::new()),
        }
    }
}

impl From<&Value> for KvNode {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

#[cfg(test)]
#[path = "tests/kv_tests.rs"]
mod tests;
