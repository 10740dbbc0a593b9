//! Geocode result cache.
//!
//! Keyed by a digest of the normalized query so repeated identical addresses
//! within a run (or across runs, with a durable backend) cost no provider
//! calls. The durable SQLite implementation lives next to the session store
//! in `veriroute-batch`.

use std::collections::HashMap;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

/// Cache key: SHA-256 of the lowercased, trimmed query string.
pub fn query_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.trim().to_lowercase().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A cached resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedHit {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
    pub provider: String,
}

/// Storage backend for resolved queries. `put` receives the original query
/// alongside the key so durable backends can keep it for inspection.
pub trait GeocodeCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CachedHit>;
    fn put(&self, key: &str, query: &str, hit: &CachedHit);
}

/// Process-lifetime cache, the default when no store is attached.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedHit>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeocodeCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CachedHit> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn put(&self, key: &str, _query: &str, hit: &CachedHit) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), hit.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalizes_case_and_whitespace() {
        let a = query_key("Jl. Sudirman No.1, Jakarta");
        let b = query_key("  jl. sudirman no.1, jakarta  ");
        let c = query_key("Jl. Thamrin No.5, Jakarta");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        let key = query_key("Jl. Sudirman No.1");
        assert!(cache.get(&key).is_none());

        let hit = CachedHit {
            lat: -6.2090,
            lng: 106.8455,
            display_name: "Jalan Jenderal Sudirman, Jakarta".into(),
            provider: "Nominatim".into(),
        };
        cache.put(&key, "Jl. Sudirman No.1", &hit);
        assert_eq!(cache.get(&key), Some(hit));
    }
}
