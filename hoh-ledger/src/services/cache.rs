//! Cache layer for taxonomy queries and enriched read-model pages
//!
//! The cache is a port: the service is handed a `dyn CachePort` so the
//! backing store is swappable (an in-memory map here, redis or similar in
//! a deployment). Values are JSON strings, redis-shaped. Consistency is
//! eventual within the TTL window; every mutating operation invalidates
//! the `categories:*` and `records:*` namespaces wholesale, trading
//! hit-rate for correctness.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cache access port
#[async_trait]
pub trait CachePort: Send + Sync {
    /// Fetch a live value; expired or absent keys are a miss
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value with a TTL in seconds
    async fn set(&self, key: &str, value: String, ttl_secs: u64);

    /// Drop every key matching the pattern. A trailing `*` matches a
    /// prefix; anything else is an exact key.
    async fn invalidate_pattern(&self, pattern: &str);
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory cache backend
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CachePort for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            // Expired entries are swept on the next set
            return None;
        }
        Some(entry.value.clone())
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + Duration::from_secs(ttl_secs),
            },
        );
    }

    async fn invalidate_pattern(&self, pattern: &str) {
        let mut entries = self.entries.write().await;
        match pattern.strip_suffix('*') {
            Some(prefix) => entries.retain(|key, _| !key.starts_with(prefix)),
            None => {
                entries.remove(pattern);
            }
        }
    }
}
