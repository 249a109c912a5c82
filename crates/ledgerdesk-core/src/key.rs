// ── Query keys ──
//
// A key is an ordered tuple `[base, operation, ...params]` of JSON values.
// Equality and hashing are structural, so two callers that build the same
// tuple independently hit the same cache entry.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey(Vec<Value>);

impl QueryKey {
    pub fn new(base: impl Into<String>) -> Self {
        Self(vec![Value::String(base.into())])
    }

    /// Append a string segment (an operation name such as `"paginated"`).
    #[must_use]
    pub fn with(mut self, part: impl Into<String>) -> Self {
        self.0.push(Value::String(part.into()));
        self
    }

    /// Append any serializable parameter. Values that fail to serialize
    /// contribute `null`, which still yields a distinct, stable key.
    #[must_use]
    pub fn with_param<S: Serialize + ?Sized>(mut self, param: &S) -> Self {
        self.0.push(serde_json::to_value(param).unwrap_or(Value::Null));
        self
    }

    pub fn parts(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` when `prefix` matches this key's leading parts.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The first segment, used as the entity scope for mutation tickets.
    pub fn base(&self) -> Option<&str> {
        self.0.first().and_then(Value::as_str)
    }
}

// serde_json::Value has no Hash impl; the compact serialization is a
// faithful structural fingerprint because object keys are sorted.
impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for part in &self.0 {
            part.to_string().hash(state);
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Array(self.0.clone()))
    }
}

impl From<&str> for QueryKey {
    fn from(base: &str) -> Self {
        Self::new(base)
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(parts: [&str; N]) -> Self {
        Self(parts.iter().map(|p| Value::String((*p).to_owned())).collect())
    }
}
