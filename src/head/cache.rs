// Per-head key/value cache.
//
// Keys, values and the raw token sequence are stored in one record and only
// ever grow together, so all three always have the same length.

use serde::Serialize;

use super::Specialization;

/// A cached value record. Embeddings are placeholders, not real projections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheValue {
    pub token: String,
    pub position: usize,
    pub embedding: Vec<f32>,
    pub specialization: Specialization,
    /// Set when the value was produced under an allocation above 1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation: Option<f32>,
}

impl CacheValue {
    /// Whether the value was produced with extra allocation.
    pub fn is_enhanced(&self) -> bool {
        self.allocation.is_some()
    }
}

/// Append-only key/value/token cache owned by one attention head.
#[derive(Debug, Clone, Default)]
pub struct HeadCache {
    keys: Vec<String>,
    values: Vec<CacheValue>,
    tokens: Vec<String>,
}

impl HeadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry to all three sequences.
    pub fn append(&mut self, key: String, value: CacheValue, token: String) {
        self.keys.push(key);
        self.values.push(value);
        self.tokens.push(token);
    }

    /// Cached keys in insertion order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Cached values in insertion order.
    pub fn values(&self) -> &[CacheValue] {
        &self.values
    }

    /// Raw tokens in insertion order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Token at `index`, if cached.
    pub fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// Most recently cached token.
    pub fn last_token(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Truncate all three sequences to empty.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.tokens.clear();
    }
}
