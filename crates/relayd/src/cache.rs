//! Response cache keyed by normalized query text.
//!
//! Entries expire after a fixed TTL. When a `put` pushes the entry count
//! past `capacity`, every expired entry is swept; live entries are never
//! evicted, so the map may exceed `capacity` between sweeps.

use relay_shared::ResolutionResult;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ResolutionResult,
    stored_at: Instant,
}

pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

/// Case-folded, whitespace-trimmed cache key.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity,
        }
    }

    pub async fn get(&self, query: &str) -> Option<ResolutionResult> {
        self.get_at(query, Instant::now()).await
    }

    pub async fn put(&self, query: &str, result: ResolutionResult) {
        self.put_at(query, result, Instant::now()).await
    }

    /// Lookup as of `now`; an entry exactly `ttl` old is expired.
    pub(crate) async fn get_at(&self, query: &str, now: Instant) -> Option<ResolutionResult> {
        let entries = self.entries.lock().await;
        entries
            .get(&normalize_query(query))
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.result.clone())
    }

    pub(crate) async fn put_at(&self, query: &str, result: ResolutionResult, now: Instant) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            normalize_query(query),
            CacheEntry {
                result,
                stored_at: now,
            },
        );

        if entries.len() > self.capacity {
            let before = entries.len();
            let ttl = self.ttl;
            entries.retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
            debug!("[C]   Swept {} expired entries", before - entries.len());
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        // Default: 100 entries before sweeping, 30 minute TTL
        Self::new(100, Duration::from_secs(30 * 60))
    }
}
