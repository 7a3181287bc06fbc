//! # Result Cache
//!
//! TTL-keyed cache of sub-operation results, keyed by [`Fingerprint`].
//!
//! Expiry is checked lazily on read: writes stay O(1) and no background task is
//! needed, at the cost of dead entries lingering until they are read, purged, or
//! cleared. One orchestrator instance lives for a bounded run, so this is fine;
//! long-lived hosts should call [`ResultCache::purge_expired`] periodically.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache entry for {key} could not be stored: {reason}")]
    WriteFailed { key: String, reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Time source for expiry decisions
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Simulated clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: parking_lot::Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: parking_lot::Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Stable key for a cacheable unit of work.
///
/// Hashes `(file path, content hash, sorted transformation ids)` with BLAKE3.
/// Every component is length-prefixed so distinct tuples cannot collide by
/// concatenation; transformation order does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    const DOMAIN: &'static [u8] = b"migrator-core/fingerprint/v1";

    pub fn new<S: AsRef<str>>(path: &Path, content_hash: &str, transformations: &[S]) -> Self {
        let mut sorted: Vec<&str> = transformations.iter().map(AsRef::as_ref).collect();
        sorted.sort_unstable();

        let mut hasher = blake3::Hasher::new();
        hasher.update(Self::DOMAIN);
        Self::update_field(&mut hasher, path.as_os_str().as_encoded_bytes());
        Self::update_field(&mut hasher, content_hash.as_bytes());
        hasher.update(&(sorted.len() as u64).to_le_bytes());
        for transformation in sorted {
            Self::update_field(&mut hasher, transformation.as_bytes());
        }

        Self(hasher.finalize().to_hex().to_string())
    }

    /// Fingerprint raw file content rather than a precomputed content hash
    pub fn for_content<S: AsRef<str>>(path: &Path, content: &[u8], transformations: &[S]) -> Self {
        let content_hash = blake3::hash(content);
        Self::new(path, content_hash.to_hex().as_str(), transformations)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn update_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    /// `None` when the TTL reaches past what the clock can represent
    pub expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Storage seam for cached results; `get` and `set` never block
pub trait CacheStore<T>: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<T>>;
    fn set(&self, key: &str, value: T, ttl: Duration) -> CacheResult<()>;
    fn clear(&self) -> CacheResult<()>;
    fn provider_name(&self) -> &'static str;
}

/// In-memory TTL cache backed by a sharded map
#[derive(Debug)]
pub struct ResultCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone + Send + Sync> ResultCache<T> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Return the live value for `key`; an expired entry is dropped and missed
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }

        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        trace!(key, "Expired cache entry removed on read");
        None
    }

    /// Insert or replace `key`; replacing resets the TTL
    pub fn set(&self, key: &str, value: T, ttl: Duration) {
        let created_at = self.clock.now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at,
                expires_at: created_at.checked_add(ttl),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Entries currently held, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

impl<T: Clone + Send + Sync> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> CacheStore<T> for ResultCache<T> {
    fn get(&self, key: &str) -> CacheResult<Option<T>> {
        Ok(ResultCache::get(self, key))
    }

    fn set(&self, key: &str, value: T, ttl: Duration) -> CacheResult<()> {
        ResultCache::set(self, key, value, ttl);
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        ResultCache::clear(self);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "in_memory"
    }
}

/// Always-miss store used when caching is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCacheStore;

impl<T> CacheStore<T> for NoOpCacheStore {
    fn get(&self, _key: &str) -> CacheResult<Option<T>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: T, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cache_with_clock() -> (ResultCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ResultCache::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_hit_before_ttl_and_miss_after() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", "v".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get("k"), Some("v".to_string()));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reset_on_set_extends_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", "first".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));

        cache.set("k", "second".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get("k"), Some("second".to_string()));
    }

    #[test]
    fn test_clear_drops_everything() {
        let (cache, _clock) = cache_with_clock();
        cache.set("a", "1".to_string(), Duration::from_secs(10));
        cache.set("b", "2".to_string(), Duration::from_secs(10));
        cache.clear();
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = cache_with_clock();
        cache.set("short", "1".to_string(), Duration::from_secs(1));
        cache.set("long", "2".to_string(), Duration::from_secs(100));
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("long"), Some("2".to_string()));
    }

    #[test]
    fn test_noop_store_always_misses() {
        let store = NoOpCacheStore;
        <NoOpCacheStore as CacheStore<u32>>::set(&store, "k", 1, Duration::from_secs(1)).unwrap();
        assert_eq!(
            <NoOpCacheStore as CacheStore<u32>>::get(&store, "k").unwrap(),
            None
        );
    }

    #[test]
    fn test_fingerprint_is_stable_and_order_insensitive() {
        let path = PathBuf::from("src/app.ts");
        let a = Fingerprint::new(&path, "abc", &["imports", "types"]);
        let b = Fingerprint::new(&path, "abc", &["types", "imports"]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_each_component() {
        let path = PathBuf::from("src/app.ts");
        let base = Fingerprint::new(&path, "abc", &["imports"]);

        assert_ne!(base, Fingerprint::new(Path::new("src/app.tsx"), "abc", &["imports"]));
        assert_ne!(base, Fingerprint::new(&path, "abd", &["imports"]));
        assert_ne!(base, Fingerprint::new(&path, "abc", &["types"]));
        assert_ne!(base, Fingerprint::new(&path, "abc", &["imports", "types"]));
    }

    #[test]
    fn test_fingerprint_fields_do_not_run_together() {
        let a = Fingerprint::new(Path::new("ab"), "c", &["x"]);
        let b = Fingerprint::new(Path::new("a"), "bc", &["x"]);
        assert_ne!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_fingerprint_distinguishes_non_utf8_paths() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = Path::new(OsStr::from_bytes(b"src/a\xff.ts"));
        let b = Path::new(OsStr::from_bytes(b"src/a\xfe.ts"));
        assert_ne!(
            Fingerprint::new(a, "abc", &["imports"]),
            Fingerprint::new(b, "abc", &["imports"])
        );
    }

    #[test]
    fn test_ttl_past_clock_range_never_expires() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", "v".to_string(), Duration::from_secs(u64::MAX));
        clock.advance(Duration::from_secs(365 * 24 * 60 * 60));
        assert_eq!(cache.get("k"), Some("v".to_string()));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_fingerprint_for_content() {
        let path = Path::new("lib.rs");
        let a = Fingerprint::for_content(path, b"fn main() {}", &["fmt"]);
        let b = Fingerprint::for_content(path, b"fn main() { }", &["fmt"]);
        assert_ne!(a, b);
        assert_eq!(a, Fingerprint::for_content(path, b"fn main() {}", &["fmt"]));
    }
}
