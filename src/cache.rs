//! Lookup-result caching with a fixed 24-hour TTL.
//!
//! The [`CacheStore`] trait defines the two operations the resolver needs
//! (`get`, `set`), enabling pluggable backends. Two implementations ship:
//!
//! - **[`MemoryCache`]** — a `RwLock<HashMap>` for the long-lived proxy
//!   server process. No capacity bound; entries are only ever ignored when
//!   stale and overwritten on the next write.
//! - **[`FileCache`]** — one JSON file per barcode under a cache directory,
//!   for the one-shot CLI client. Storage failures are swallowed: a failed
//!   read is a miss, a failed write is a no-op. Callers must never see the
//!   cache as a source of hard errors.
//!
//! Both take their notion of "now" from an injected [`Clock`] so tests can
//! step time across the TTL boundary.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::CachedLookup;

/// Cache validity window: 24 hours, in milliseconds.
pub const CACHE_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Source of the current time, injected so tests can control it.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Production clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Persisted cache-entry wire shape: `{ts: epoch-millis, data: payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Write timestamp, epoch milliseconds.
    pub ts: i64,
    pub data: CachedLookup,
}

/// Abstract lookup cache keyed by barcode.
///
/// A read returns `None` both when the key is missing and when the stored
/// entry is older than [`CACHE_TTL_MS`]; the two cases are indistinguishable
/// to the caller, which proceeds to a fresh lookup either way. A write
/// unconditionally overwrites any prior entry and stamps the current time.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the cached payload for `key` if present and fresh.
    async fn get(&self, key: &str) -> Option<CachedLookup>;

    /// Stores `data` under `key`, stamped with the current time.
    async fn set(&self, key: &str, data: CachedLookup);
}

/// In-memory cache for the proxy server.
///
/// Concurrent handlers share one instance behind an `Arc`; writes are
/// last-write-wins, which is safe because entries are immutable value
/// overwrites and staleness is bounded by the TTL.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachedLookup> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;
        if self.clock.now_millis() - entry.ts < CACHE_TTL_MS {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    async fn set(&self, key: &str, data: CachedLookup) {
        let entry = CacheEntry {
            ts: self.clock.now_millis(),
            data,
        };
        self.entries.write().unwrap().insert(key.to_string(), entry);
    }
}

/// On-disk cache for the CLI client, one JSON file per barcode.
///
/// The directory is created lazily on first write. All I/O and parse
/// failures degrade to a miss or a no-op; a corrupt or unreadable file is
/// treated exactly like an absent key.
pub struct FileCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    pub fn new(dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self { dir, clock }
    }

    /// Maps a barcode to a file path. Barcodes are numeric in practice, but
    /// anything outside `[A-Za-z0-9_-]` is replaced so a hostile key cannot
    /// escape the cache directory.
    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &str) -> Option<CachedLookup> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "unreadable cache file, treating as miss");
                return None;
            }
        };
        if self.clock.now_millis() - entry.ts < CACHE_TTL_MS {
            Some(entry.data)
        } else {
            None
        }
    }

    async fn set(&self, key: &str, data: CachedLookup) {
        let entry = CacheEntry {
            ts: self.clock.now_millis(),
            data,
        };
        let body = match serde_json::to_vec(&entry) {
            Ok(body) => body,
            Err(_) => return,
        };
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            debug!(dir = %self.dir.display(), error = %e, "cache dir unavailable, skipping write");
            return;
        }
        if let Err(e) = tokio::fs::write(self.path_for(key), body).await {
            debug!(key, error = %e, "cache write failed, skipping");
        }
    }
}

/// Test clock that only moves when told to. Shared by the cache and
/// resolver unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};

    pub(crate) struct ManualClock(AtomicI64);

    impl ManualClock {
        pub(crate) fn new(start: i64) -> Self {
            Self(AtomicI64::new(start))
        }

        pub(crate) fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;
    use crate::models::{Product, Source};

    fn sample() -> CachedLookup {
        let mut p = Product::empty("737628064502", Source::FoodFacts);
        p.product_name = Some("Example Bar".to_string());
        CachedLookup::Found { product: p }
    }

    #[tokio::test]
    async fn test_memory_round_trip_before_ttl() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = MemoryCache::new(clock.clone());
        cache.set("737628064502", sample()).await;
        clock.advance(CACHE_TTL_MS - 1);
        assert_eq!(cache.get("737628064502").await, Some(sample()));
    }

    #[tokio::test]
    async fn test_memory_read_at_ttl_boundary_is_a_miss() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = MemoryCache::new(clock.clone());
        cache.set("737628064502", sample()).await;
        // Exactly TTL old: `now - ts < TTL` no longer holds.
        clock.advance(CACHE_TTL_MS);
        assert_eq!(cache.get("737628064502").await, None);
        clock.advance(1);
        assert_eq!(cache.get("737628064502").await, None);
    }

    #[tokio::test]
    async fn test_memory_write_overwrites_and_restamps() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = MemoryCache::new(clock.clone());
        cache.set("1", CachedLookup::NotFound).await;
        clock.advance(CACHE_TTL_MS - 10);
        cache.set("1", sample()).await;
        clock.advance(CACHE_TTL_MS - 10);
        // Fresh relative to the second write.
        assert_eq!(cache.get("1").await, Some(sample()));
    }

    #[tokio::test]
    async fn test_memory_missing_key() {
        let cache = MemoryCache::new(Arc::new(ManualClock::new(0)));
        assert_eq!(cache.get("nope").await, None);
    }

    #[tokio::test]
    async fn test_file_cache_round_trip_and_ttl() {
        let tmp = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(500));
        let cache = FileCache::new(tmp.path().join("cache"), clock.clone());
        cache.set("737628064502", sample()).await;
        assert_eq!(cache.get("737628064502").await, Some(sample()));
        clock.advance(CACHE_TTL_MS + 1);
        assert_eq!(cache.get("737628064502").await, None);
    }

    #[tokio::test]
    async fn test_file_cache_corrupt_file_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("cache");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("123.json"), b"{not json").unwrap();
        let cache = FileCache::new(dir, Arc::new(ManualClock::new(0)));
        assert_eq!(cache.get("123").await, None);
    }

    #[tokio::test]
    async fn test_file_cache_sanitizes_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = FileCache::new(tmp.path().to_path_buf(), Arc::new(ManualClock::new(0)));
        cache.set("../escape", CachedLookup::NotFound).await;
        // The write lands inside the cache dir, not its parent.
        assert_eq!(cache.get("../escape").await, Some(CachedLookup::NotFound));
        assert!(!tmp.path().parent().unwrap().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_file_cache_unwritable_dir_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        // A file where the cache dir should be makes create_dir_all fail.
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let cache = FileCache::new(blocked, Arc::new(ManualClock::new(0)));
        cache.set("1", CachedLookup::NotFound).await;
        assert_eq!(cache.get("1").await, None);
    }
}
