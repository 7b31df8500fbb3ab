//! In-memory cache of table metadata with time-bounded validity.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::record::TableMetadata;

/// Default time-to-live for cached records.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Cache entry for a table.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The cached snapshot.
    record: Arc<TableMetadata>,

    /// When the entry was inserted.
    inserted_at: Instant,
}

/// Cache of table metadata snapshots.
///
/// An entry older than the TTL is reported as a miss; refetching is left to
/// the caller. When `max_entries` is set, inserting into a full cache evicts
/// the entry that was inserted earliest.
#[derive(Debug)]
pub struct MetadataCache {
    /// In-memory cache.
    entries: RwLock<HashMap<String, CacheEntry>>,

    /// How long an entry stays valid.
    ttl: Duration,

    /// Maximum cache size.
    max_entries: Option<usize>,
}

impl MetadataCache {
    /// Create a cache with the given TTL and no capacity bound.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: None,
        }
    }

    /// Bound the number of cached tables.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a fresh cached record.
    pub fn get(&self, table_name: &str) -> Option<Arc<TableMetadata>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(table_name)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(Arc::clone(&entry.record))
        } else {
            debug!("Cache entry expired for table: {table_name}");
            None
        }
    }

    /// Insert or replace a record, resetting its age.
    pub fn put(&self, table_name: &str, record: Arc<TableMetadata>) {
        if self.max_entries == Some(0) {
            return;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        // Evict if at capacity
        let at_capacity = self
            .max_entries
            .is_some_and(|max| entries.len() >= max && !entries.contains_key(table_name));
        if at_capacity {
            let oldest_key = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest_key) = oldest_key {
                entries.remove(&oldest_key);
                debug!("Evicted cache entry for table: {oldest_key}");
            }
        }

        entries.insert(
            table_name.to_string(),
            CacheEntry {
                record,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for a table.
    pub fn invalidate(&self, table_name: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table_name);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("Cleared table metadata cache");
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: entries.len(),
            fresh_entries: entries
                .values()
                .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
                .count(),
            max_entries: self.max_entries,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// Statistics about the metadata cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache, expired ones included.
    pub entries: usize,

    /// Number of entries still within the TTL.
    pub fresh_entries: usize,

    /// Maximum cache size.
    pub max_entries: Option<usize>,

    /// Time-to-live in seconds.
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str) -> Arc<TableMetadata> {
        Arc::new(TableMetadata::new(name))
    }

    /// Backdate an entry so it looks `age` old.
    fn age_entry(cache: &MetadataCache, table_name: &str, age: Duration) {
        let mut entries = cache.entries.write().unwrap();
        let entry = entries.get_mut(table_name).unwrap();
        entry.inserted_at = Instant::now().checked_sub(age).unwrap();
    }

    #[test]
    fn test_cache_put_get() {
        let cache = MetadataCache::default();
        cache.put("users", record("users"));

        let hit = cache.get("users").unwrap();
        assert_eq!(hit.table_name, "users");
    }

    #[test]
    fn test_cache_miss() {
        let cache = MetadataCache::default();
        assert!(cache.get("not cached").is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        cache.put("users", record("users"));
        age_entry(&cache, "users", Duration::from_secs(61));

        assert!(cache.get("users").is_none());
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.stats().fresh_entries, 0);
    }

    #[test]
    fn test_put_resets_age() {
        let cache = MetadataCache::new(Duration::from_secs(60));
        cache.put("users", record("users"));
        age_entry(&cache, "users", Duration::from_secs(61));

        cache.put("users", record("users"));
        assert!(cache.get("users").is_some());
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = MetadataCache::new(Duration::ZERO);
        cache.put("users", record("users"));
        assert!(cache.get("users").is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = MetadataCache::default();
        cache.put("users", record("users"));
        cache.put("orders", record("orders"));

        cache.invalidate("users");
        assert!(cache.get("users").is_none());
        assert!(cache.get("orders").is_some());

        cache.invalidate_all();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cache_eviction_removes_oldest_insert() {
        let cache = MetadataCache::default().with_max_entries(2);
        cache.put("a", record("a"));
        cache.put("b", record("b"));
        age_entry(&cache, "a", Duration::from_secs(5));
        age_entry(&cache, "b", Duration::from_secs(1));

        cache.put("c", record("c"));

        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_replacing_entry_in_full_cache_does_not_evict() {
        let cache = MetadataCache::default().with_max_entries(2);
        cache.put("a", record("a"));
        cache.put("b", record("b"));

        cache.put("a", record("a"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_stats() {
        let cache = MetadataCache::new(Duration::from_secs(30)).with_max_entries(10);
        cache.put("users", record("users"));

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                fresh_entries: 1,
                max_entries: Some(10),
                ttl_secs: 30,
            }
        );
    }
}
