//! Memoization of cell graphs across runs
//!
//! The cache maps `CACHE_PREFIX + ultra-canonical form` to the printed
//! flattened cell graph. It only saves tool invocations: a miss, or no cache
//! at all, produces the same output.

use dashmap::DashMap;

/// Key prefix of isomorphism-filter cell graphs
pub const CACHE_PREFIX: &str = "IF";

/// Key-value store for printed cell graphs
pub trait CellGraphCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CellGraphCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|value| value.clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// Cache key of a sentence
pub fn key(ultra_canonical: &str) -> String {
    format!("{CACHE_PREFIX}{ultra_canonical}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        assert!(cache.get(&key("(V x U0(x))")).is_none());
        cache.set(&key("(V x U0(x))"), "W(1, g0), G(g0)");
        assert_eq!(cache.get("IF(V x U0(x))").as_deref(), Some("W(1, g0), G(g0)"));
        assert_eq!(cache.len(), 1);
    }
}
