// Strategy-scoped map simulating cross-head reuse of computed entries.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// One shared-cache record.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedEntry {
    pub token: String,
    pub position: usize,
    /// Milliseconds since the Unix epoch at insertion.
    pub timestamp: u64,
}

/// Map from `"<token>_<position>"` to the last entry written under that key.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    entries: HashMap<String, SharedEntry>,
}

impl SharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lookup key for `token` at `position`.
    pub fn key(token: &str, position: usize) -> String {
        format!("{}_{}", token, position)
    }

    /// Insert or overwrite the entry for `token` at `position`.
    pub fn insert(&mut self, token: &str, position: usize) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.entries.insert(
            Self::key(token, position),
            SharedEntry {
                token: token.to_string(),
                position,
                timestamp,
            },
        );
    }

    pub fn contains(&self, token: &str, position: usize) -> bool {
        self.entries.contains_key(&Self::key(token, position))
    }

    pub fn get(&self, token: &str, position: usize) -> Option<&SharedEntry> {
        self.entries.get(&Self::key(token, position))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
