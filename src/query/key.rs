use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered tuple identifying a cached query result, e.g.
/// `["companies", 1, {"status": "active"}]`.
///
/// Equality and hashing are structural: two separately built keys with equal
/// values are the same key, and object field order does not matter.
#[derive(Clone)]
pub struct QueryKey {
    parts: Vec<Value>,
    canonical: String,
}

/// Build a [`QueryKey`] from JSON-like parts.
///
/// ```ignore
/// let key = query_key!["companies", 1, {"status": "active"}];
/// ```
///
/// Negative numbers need parentheses: `query_key!["offset", (-1)]`.
#[macro_export]
macro_rules! query_key {
    () => {
        $crate::query::QueryKey::new(::std::vec::Vec::new())
    };
    ($($part:tt),+ $(,)?) => {
        $crate::query::QueryKey::new(::std::vec![$($crate::__serde_json::json!($part)),+])
    };
}

impl QueryKey {
    pub fn new(parts: Vec<Value>) -> Self {
        let parts: Vec<Value> = parts.into_iter().map(canonicalize).collect();
        // Serializing a Vec<Value> cannot fail
        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        Self { parts, canonical }
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// First part as a string, the resource name by convention.
    pub fn resource(&self) -> Option<&str> {
        self.parts.first().and_then(Value::as_str)
    }

    /// True when `prefix` matches the leading parts of this key.
    /// The empty key is a prefix of every key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        prefix.parts.len() <= self.parts.len()
            && prefix.parts.iter().zip(&self.parts).all(|(a, b)| a == b)
    }

    /// Compact JSON form, stable across field order.
    pub fn as_canonical_str(&self) -> &str {
        &self.canonical
    }
}

/// Rebuild objects with sorted keys so the canonical string does not depend
/// on insertion order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryKey({})", self.canonical)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl From<Vec<Value>> for QueryKey {
    fn from(parts: Vec<Value>) -> Self {
        Self::new(parts)
    }
}

impl From<&str> for QueryKey {
    fn from(resource: &str) -> Self {
        Self::new(vec![Value::String(resource.to_string())])
    }
}

impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.parts.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QueryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Value>::deserialize(deserializer).map(QueryKey::new)
    }
}
