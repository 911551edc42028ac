//! Immutable attribute containers attached to variants and requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// An ordered, immutable set of named attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeContainer {
    entries: BTreeMap<String, AttributeValue>,
}

impl AttributeContainer {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a copy of this container with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every requested attribute is present here with an equal value.
    pub fn satisfies(&self, requested: &AttributeContainer) -> bool {
        requested
            .entries
            .iter()
            .all(|(k, v)| self.entries.get(k) == Some(v))
    }
}

impl From<BTreeMap<String, AttributeValue>> for AttributeContainer {
    fn from(entries: BTreeMap<String, AttributeValue>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, AttributeValue)> for AttributeContainer {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for AttributeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_requires_all_requested() {
        let variant = AttributeContainer::empty()
            .with("usage", "runtime")
            .with("jvm", 17i64);
        let wanted = AttributeContainer::empty().with("usage", "runtime");
        assert!(variant.satisfies(&wanted));
        assert!(variant.satisfies(&AttributeContainer::empty()));
        let other = AttributeContainer::empty().with("usage", "api");
        assert!(!variant.satisfies(&other));
    }

    #[test]
    fn display_is_sorted() {
        let c = AttributeContainer::empty().with("b", true).with("a", "x");
        assert_eq!(c.to_string(), "{a=x, b=true}");
    }
}
