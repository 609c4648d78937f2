//! Cache storage for listing artifacts.
//!
//! One keyed string store backs both layers: assembled JSON responses
//! and the row/total hints the content store keeps warm. Entries carry
//! their own expiry; there is no invalidation path, stale listings age
//! out when their time bucket rolls.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use metrics::{counter, gauge};
use thiserror::Error;
use tracing::debug;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HITS: &str = "mediateca_cache_hits_total";
pub const METRIC_CACHE_MISSES: &str = "mediateca_cache_misses_total";
pub const METRIC_CACHE_ENTRIES: &str = "mediateca_cache_entries";

/// Metric label for the layer a key belongs to, following the suffix
/// conventions of [`super::keys`].
fn layer_label(key: &str) -> &'static str {
    if key.ends_with(":json") {
        "response"
    } else if key.ends_with(":total") {
        "total"
    } else {
        "rows"
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Keyed string storage with per-entry expiry.
///
/// Reads are best-effort: an expired, missing, or unreachable entry all
/// surface as `None`, and callers fall through to the store.
#[async_trait]
pub trait ListingCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process cache with LRU eviction on top of per-entry expiry.
pub struct MemoryListingCache {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryListingCache {
    /// A zero capacity is clamped to one slot.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ListingCache for MemoryListingCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                counter!(METRIC_CACHE_HITS, "layer" => layer_label(key)).increment(1);
                debug!(key, outcome = "hit", "listing cache read");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.pop(key);
                gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);
                counter!(METRIC_CACHE_MISSES, "layer" => layer_label(key)).increment(1);
                debug!(key, outcome = "expired", "listing cache read");
                None
            }
            None => {
                counter!(METRIC_CACHE_MISSES, "layer" => layer_label(key)).increment(1);
                debug!(key, outcome = "miss", "listing cache read");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = rw_write(&self.entries, SOURCE, "set");
        entries.put(key.to_owned(), entry);
        gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);
        Ok(())
    }
}
