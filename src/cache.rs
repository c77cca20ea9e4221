//! Memoization of query results.
//!
//! Entries are keyed by [`AggregationQuery::cache_key`](crate::query::AggregationQuery::cache_key),
//! which covers the through date, so a new day always misses. Entries also
//! expire after a time-to-live and can be dropped explicitly.

use crate::types::EventRow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default time-to-live for cached results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct CacheEntry {
    rows: Arc<Vec<EventRow>>,
    stored_at: Instant,
}

/// In-memory result cache. Not persisted across process restarts.
pub struct QueryCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Look up a fresh entry, evicting it if it has expired.
    pub fn get(&mut self, key: &str) -> Option<Arc<Vec<EventRow>>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&mut self, key: &str, now: Instant) -> Option<Arc<Vec<EventRow>>> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) >= self.ttl {
            log::debug!("Cache entry {} expired", short(key));
            self.entries.remove(key);
            return None;
        }
        Some(Arc::clone(&entry.rows))
    }

    /// Store rows under `key`, returning the shared handle.
    ///
    /// Expired entries under other keys are dropped first; keys for past
    /// through dates are never looked up again.
    pub fn insert(&mut self, key: impl Into<String>, rows: Vec<EventRow>) -> Arc<Vec<EventRow>> {
        self.insert_at(key.into(), rows, Instant::now())
    }

    fn insert_at(&mut self, key: String, rows: Vec<EventRow>, now: Instant) -> Arc<Vec<EventRow>> {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);
        if self.entries.len() < before {
            log::debug!("Evicted {} expired cache entries", before - self.entries.len());
        }

        let rows = Arc::new(rows);
        self.entries.insert(
            key,
            CacheEntry {
                rows: Arc::clone(&rows),
                stored_at: now,
            },
        );
        rows
    }

    /// Drop one entry. Returns true if it was present.
    pub fn invalidate_key(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry, returning how many were removed.
    pub fn invalidate(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_rows() -> Vec<EventRow> {
        vec![EventRow {
            event_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            model_name: "ModelA".to_string(),
            variant_name: "V1".to_string(),
            color_name: Some("Red".to_string()),
            feature_name: None,
            accessory_name: None,
            pack_name: None,
            event_count: 3,
        }]
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = QueryCache::default();
        let stored = cache.insert("key", make_rows());
        let hit = cache.get("key").unwrap();
        assert!(Arc::ptr_eq(&stored, &hit));
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        cache.insert("key", make_rows());

        let later = Instant::now() + Duration::from_secs(61);
        assert!(cache.get_at("key", later).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_evicts_expired_entries() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.insert_at("day-1".to_string(), make_rows(), start);
        cache.insert_at("day-2".to_string(), make_rows(), start + Duration::from_secs(30));

        cache.insert_at("day-3".to_string(), make_rows(), start + Duration::from_secs(61));
        assert_eq!(cache.len(), 2);
        assert!(cache.get_at("day-1", start + Duration::from_secs(61)).is_none());
        assert!(cache.get_at("day-2", start + Duration::from_secs(61)).is_some());
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let mut cache = QueryCache::new(Duration::ZERO);
        cache.insert("key", make_rows());
        assert!(cache.get("key").is_none());
    }

    #[test]
    fn test_invalidate() {
        let mut cache = QueryCache::default();
        cache.insert("a", make_rows());
        cache.insert("b", make_rows());

        assert!(cache.invalidate_key("a"));
        assert!(!cache.invalidate_key("a"));
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.invalidate(), 1);
        assert!(cache.is_empty());
    }
}
