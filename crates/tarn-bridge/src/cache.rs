//! Partial-evaluation memo cache
//!
//! Per-compiler memoization of partial-evaluation artifacts, keyed by
//! method token. Purging is safe at any time and affects only subsequent
//! compile latency, never correctness.

use std::sync::Arc;

use dashmap::DashMap;

use crate::api::MethodToken;

/// Purgeable artifact cache shared by compilations on one compiler.
pub struct PartialEvalCache {
    entries: DashMap<MethodToken, Arc<[u8]>>,
}

impl PartialEvalCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        PartialEvalCache {
            entries: DashMap::new(),
        }
    }

    /// Look up a memoized artifact.
    pub fn get(&self, method: MethodToken) -> Option<Arc<[u8]>> {
        self.entries.get(&method).map(|e| e.clone())
    }

    /// Memoize an artifact, replacing any previous one.
    pub fn insert(&self, method: MethodToken, artifact: Arc<[u8]>) {
        self.entries.insert(method, artifact);
    }

    /// Drop every memoized artifact.
    pub fn purge(&self) {
        self.entries.clear();
    }

    /// Number of memoized artifacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PartialEvalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_purge() {
        let cache = PartialEvalCache::new();
        let method = MethodToken(9);
        assert!(cache.get(method).is_none());

        cache.insert(method, Arc::from(&b"artifact"[..]));
        assert_eq!(cache.get(method).unwrap().as_ref(), b"artifact");
        assert_eq!(cache.len(), 1);

        cache.purge();
        assert!(cache.is_empty());
        assert!(cache.get(method).is_none());
    }
}
