//! Result caching for discoveries.
//!
//! Entries are keyed per calendar day so a cached discovery is reused for
//! at most a day. Only successful discoveries are stored.

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::IconfinderError;
use crate::models::Icon;

/// Byte-oriented cache for encoded discovery results.
///
/// Implementations must tolerate concurrent `get` and `put`.
#[cfg_attr(test, mockall::automock)]
pub trait IconCache: Send + Sync {
    /// Returns the stored value for `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IconfinderError>;

    /// Stores `value` under `key`.
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), IconfinderError>;
}

/// Builds the cache key for `url` on `date`, e.g. `2024-05-01-http://a.com`.
#[must_use]
pub fn cache_key(date: NaiveDate, url: &str) -> String {
    format!("{}-{url}", date.format("%Y-%m-%d"))
}

/// Serialized form of a discovery result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CachedResult {
    /// Discovered icons, best first.
    #[serde(default)]
    pub icons: Vec<Icon>,
    /// Error message, if the discovery failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CachedResult {
    /// Wraps a list of icons.
    #[must_use]
    pub const fn from_icons(icons: Vec<Icon>) -> Self {
        Self { icons, error: None }
    }

    /// Encodes as JSON.
    pub fn encode(&self) -> Result<Vec<u8>, IconfinderError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    pub fn decode(bytes: &[u8]) -> Result<Self, IconfinderError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The icons, or the stored error.
    pub fn into_result(self) -> Result<Vec<Icon>, IconfinderError> {
        match self.error {
            Some(error) => Err(IconfinderError::Cached(error)),
            None => Ok(self.icons),
        }
    }
}

/// In-process [`IconCache`] with a byte budget.
///
/// When the budget is exceeded the oldest entries are evicted first. Values
/// larger than the whole budget are not stored.
#[derive(Debug)]
pub struct MemoryIconCache {
    entries: DashMap<String, Vec<u8>>,
    order: Mutex<VecDeque<String>>,
    used_bytes: AtomicUsize,
    max_bytes: usize,
}

impl MemoryIconCache {
    /// Creates a cache holding at most `max_bytes` of values.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            used_bytes: AtomicUsize::new(0),
            max_bytes,
        }
    }

    /// Creates a cache with a budget of `megabytes` MiB.
    #[must_use]
    pub fn with_megabytes(megabytes: usize) -> Self {
        Self::new(megabytes.saturating_mul(1024 * 1024))
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of stored values.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::SeqCst)
    }

    /// Clears all entries.
    pub fn clear(&self) {
        let mut order = self.order.lock();
        self.entries.clear();
        order.clear();
        self.used_bytes.store(0, Ordering::SeqCst);
    }
}

impl Default for MemoryIconCache {
    fn default() -> Self {
        Self::with_megabytes(32)
    }
}

impl IconCache for MemoryIconCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IconfinderError> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), IconfinderError> {
        if value.len() > self.max_bytes {
            return Ok(());
        }

        // Writers are serialized so the byte count matches the map.
        let mut order = self.order.lock();
        let added = value.len();
        if let Some(old) = self.entries.insert(key.to_string(), value) {
            self.used_bytes.fetch_sub(old.len(), Ordering::SeqCst);
            order.retain(|k| k != key);
        }
        order.push_back(key.to_string());
        let mut used = self.used_bytes.fetch_add(added, Ordering::SeqCst) + added;

        while used > self.max_bytes {
            let Some(oldest) = order.pop_front() else { break };
            if let Some((_, evicted)) = self.entries.remove(&oldest) {
                used = self.used_bytes.fetch_sub(evicted.len(), Ordering::SeqCst) - evicted.len();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IconFormat;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_cache_key() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(cache_key(date, "http://example.com"), "2024-03-07-http://example.com");
        assert_ne!(cache_key(date, "http://example.com"), cache_key(date, "http://example.com/"));
    }

    #[test]
    fn test_cached_result_round_trip() {
        let icons = vec![Icon::new("http://a.com/favicon.ico", IconFormat::Ico, 32, 32).with_body_info(100, "ab")];
        let encoded = CachedResult::from_icons(icons.clone()).encode().unwrap();
        let decoded = CachedResult::decode(&encoded).unwrap();
        assert_eq!(decoded.into_result().unwrap(), icons);

        let failed = CachedResult {
            icons: Vec::new(),
            error: Some("boom".into()),
        };
        let decoded = CachedResult::decode(&failed.encode().unwrap()).unwrap();
        assert!(matches!(decoded.into_result(), Err(IconfinderError::Cached(e)) if e == "boom"));

        assert!(matches!(CachedResult::decode(b"{nope"), Err(IconfinderError::Serialization(_))));
    }

    #[test]
    fn test_memory_cache_get_put() {
        let cache = MemoryIconCache::new(100);
        assert_eq!(cache.get("a").unwrap(), None);
        cache.put("a", vec![1, 2, 3]).unwrap();
        assert_eq!(cache.get("a").unwrap(), Some(vec![1, 2, 3]));

        cache.put("a", vec![9]).unwrap();
        assert_eq!(cache.get("a").unwrap(), Some(vec![9]));
        assert_eq!(cache.used_bytes(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_memory_cache_evicts_oldest() {
        let cache = MemoryIconCache::new(10);
        cache.put("first", vec![0; 4]).unwrap();
        cache.put("second", vec![0; 4]).unwrap();
        cache.put("third", vec![0; 4]).unwrap();

        assert_eq!(cache.get("first").unwrap(), None);
        assert!(cache.get("second").unwrap().is_some());
        assert!(cache.get("third").unwrap().is_some());
        assert_eq!(cache.used_bytes(), 8);

        cache.put("huge", vec![0; 11]).unwrap();
        assert_eq!(cache.get("huge").unwrap(), None);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn test_memory_cache_concurrent_access() {
        let cache = Arc::new(MemoryIconCache::new(64));
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("{t}-{i}");
                        cache.put(&key, vec![0; 8]).unwrap();
                        let _ = cache.get(&key).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert!(cache.used_bytes() <= 64);
        assert_eq!(cache.used_bytes(), cache.len() * 8);
    }
}
