#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Map cache store interface and backends.
//!
//! The map query pipeline caches serialized responses under composite
//! string keys. Invalidation needs a pattern-scan-and-delete capability
//! (Redis-style `SCAN` + `DEL`); backends that lack it report so through
//! [`CacheStore::supports_pattern_scan`] and callers fall back to clearing
//! a whole namespace. Caches both paths the same way: a key is either
//! present with a serialized value or absent.

pub mod single_flight;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

pub use single_flight::SingleFlightCache;

/// Maximum number of keys removed per delete call during a pattern scan.
///
/// Bounds how long one invalidation pass can hold the cache backend,
/// mirroring Redis `SCAN` batching.
pub const SCAN_DELETE_BATCH: usize = 500;

/// Errors produced by cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache backend could not be reached or rejected the operation.
    #[error("cache unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },
    /// The backend cannot delete by pattern.
    #[error("cache backend does not support pattern scans")]
    PatternUnsupported,
}

/// Key/value cache with namespace-clear and optional pattern-delete.
///
/// Keys are flat strings with `:`-separated components; a namespace is the
/// leading component. Patterns use `*` as a multi-character wildcard.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetches the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be reached.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be reached.
    async fn put(&self, key: &str, value: String) -> Result<(), CacheError>;

    /// Removes every key beginning with `namespace` followed by `:`.
    ///
    /// Always available, even on backends without pattern scans; this is
    /// the correctness-safe fallback for invalidation.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be reached.
    async fn clear_namespace(&self, namespace: &str) -> Result<(), CacheError>;

    /// Deletes all keys matching `pattern` in bounded batches, returning
    /// how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::PatternUnsupported`] on backends without
    /// pattern scans, or [`CacheError::Unavailable`] on transport failure.
    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Whether [`scan_delete`](Self::scan_delete) is usable on this
    /// backend.
    fn supports_pattern_scan(&self) -> bool;
}

/// Matches a key against a `*`-wildcard pattern.
///
/// `*` matches any run of characters, including none. Everything else
/// matches literally.
#[must_use]
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');

    let Some(first) = parts.next() else {
        return pattern == key;
    };
    if !key.starts_with(first) {
        return false;
    }
    let mut rest = &key[first.len()..];

    let mut last_part: Option<&str> = None;
    for part in parts {
        if let Some(prev) = last_part.take()
            && !prev.is_empty()
        {
            let Some(idx) = rest.find(prev) else {
                return false;
            };
            rest = &rest[idx + prev.len()..];
        }
        last_part = Some(part);
    }

    match last_part {
        // No '*' in the pattern at all: must be an exact match.
        None => rest.is_empty(),
        Some(last) => last.is_empty() || rest.ends_with(last),
    }
}

/// In-memory [`CacheStore`] over a `BTreeMap`.
///
/// The default construction is pattern-capable, standing in for Redis.
/// [`MemoryCacheStore::without_pattern_scan`] models a plain local-process
/// cache that can only clear whole namespaces.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: RwLock<BTreeMap<String, String>>,
    pattern_scan: bool,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheStore {
    /// Creates an empty pattern-capable cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            pattern_scan: true,
        }
    }

    /// Creates an empty cache without pattern-delete support.
    #[must_use]
    pub fn without_pattern_scan() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            pattern_scan: false,
        }
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<(), CacheError> {
        let prefix = format!("{namespace}:");
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<u64, CacheError> {
        if !self.pattern_scan {
            return Err(CacheError::PatternUnsupported);
        }

        let mut deleted: u64 = 0;
        loop {
            let mut entries = self.entries.write().await;
            let batch: Vec<String> = entries
                .keys()
                .filter(|key| pattern_matches(pattern, key))
                .take(SCAN_DELETE_BATCH)
                .cloned()
                .collect();

            if batch.is_empty() {
                break;
            }
            for key in &batch {
                entries.remove(key);
            }
            deleted += batch.len() as u64;

            if batch.len() < SCAN_DELETE_BATCH {
                break;
            }
            // Yield between batches so one scan never monopolizes the lock.
            drop(entries);
            tokio::task::yield_now().await;
        }

        Ok(deleted)
    }

    fn supports_pattern_scan(&self) -> bool {
        self.pattern_scan
    }
}
