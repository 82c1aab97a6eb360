//! Per-call key/value metadata.
//!
//! Keys are case-insensitive and stored lowercase. Each key holds an ordered
//! list of values; a key may exist with zero values, which is distinct from
//! the key being absent. Interceptors may add metadata, never take it away,
//! so there is no removal API.

use std::collections::HashMap;

use axum::http::HeaderMap;

/// Headers that describe the transport rather than the call.
const TRANSPORT_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "te",
    "host",
    "connection",
    "user-agent",
    "accept-encoding",
    "transfer-encoding",
    "upgrade",
];

/// Key/value metadata attached to a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: HashMap<String, Vec<String>>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata from request headers, skipping transport-level and
    /// `grpc-*` reserved headers. Non-UTF-8 values are dropped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut metadata = Self::new();
        for (name, value) in headers {
            let key = name.as_str();
            if TRANSPORT_HEADERS.contains(&key) || key.starts_with("grpc-") {
                continue;
            }
            if let Ok(value) = value.to_str() {
                metadata.append(key, value);
            }
        }
        metadata
    }

    /// Append a value after any existing values for `key`.
    pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .entry(key.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Append every value for `key`. The key is created even when `values`
    /// is empty.
    pub fn extend<I, V>(&mut self, key: impl AsRef<str>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.entries
            .entry(key.as_ref().to_ascii_lowercase())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `key` in the order they were added. `None` when the
    /// key was never set.
    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// Returns true if `key` is present, even with zero values.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_lowercase())
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys and their values, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }
}
