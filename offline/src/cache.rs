//! Cache Storage
//!
//! Named buckets of `RequestKey -> CachedResponse`. The router only talks to
//! the [`CacheStorage`] port; [`MemoryCacheStorage`] is the bundled
//! implementation.
//!
//! Individual `put` and `delete` calls are atomic. Concurrent writers to the
//! same key race and the last one to complete wins.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hashbrown::HashMap;
use spin::RwLock;

use crate::config::{RouterConfig, DEFAULT_QUOTA};
use crate::error::CacheError;
use crate::fetch::{CachedResponse, RequestKey};

/// Storage boundary.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open (or create) a named bucket.
    async fn open(&self, bucket: &str) -> Result<(), CacheError>;

    /// Whether a named bucket exists.
    async fn has(&self, bucket: &str) -> Result<bool, CacheError>;

    /// Look up `key` in `bucket`. A missing bucket is a miss.
    async fn match_in(
        &self,
        bucket: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError>;

    /// Create-or-replace `key` in `bucket`, creating the bucket if needed.
    async fn put(
        &self,
        bucket: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError>;

    /// All bucket names.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Request keys stored in `bucket`.
    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, CacheError>;

    /// Delete a whole bucket. Returns whether it existed.
    async fn delete(&self, bucket: &str) -> Result<bool, CacheError>;
}

/// A named bucket.
#[derive(Debug, Default)]
struct Bucket {
    entries: HashMap<RequestKey, CachedResponse>,
    total_size: usize,
}

impl Bucket {
    /// Store an entry, returning the previous entry's size.
    fn put(&mut self, key: RequestKey, response: CachedResponse) -> usize {
        let size = response.size();
        let replaced = self
            .entries
            .insert(key, response)
            .map(|old| old.size())
            .unwrap_or(0);
        self.total_size = self.total_size - replaced + size;
        replaced
    }
}

/// In-memory cache storage with a byte quota.
pub struct MemoryCacheStorage {
    buckets: RwLock<BTreeMap<String, Bucket>>,
    quota: usize,
}

impl MemoryCacheStorage {
    /// Create an empty storage with the default quota.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA)
    }

    /// Create an empty storage with a custom quota.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            quota,
        }
    }

    /// Create an empty storage with the configured quota.
    pub fn for_config(config: &RouterConfig) -> Self {
        Self::with_quota(config.quota)
    }

    /// Total bytes stored across all buckets.
    pub fn usage(&self) -> usize {
        self.buckets.read().values().map(|b| b.total_size).sum()
    }

    /// Quota in bytes.
    pub fn quota(&self) -> usize {
        self.quota
    }

    /// Number of entries in a bucket (0 if absent).
    pub fn len(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .get(bucket)
            .map(|b| b.entries.len())
            .unwrap_or(0)
    }

    /// Whether a bucket holds no entries (true if absent).
    pub fn is_empty(&self, bucket: &str) -> bool {
        self.len(bucket) == 0
    }
}

impl Default for MemoryCacheStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, bucket: &str) -> Result<(), CacheError> {
        let mut buckets = self.buckets.write();
        if !buckets.contains_key(bucket) {
            log::debug!("[SW Cache] Creating bucket {}", bucket);
            buckets.insert(bucket.to_string(), Bucket::default());
        }
        Ok(())
    }

    async fn has(&self, bucket: &str) -> Result<bool, CacheError> {
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn match_in(
        &self,
        bucket: &str,
        key: &RequestKey,
    ) -> Result<Option<CachedResponse>, CacheError> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .and_then(|b| b.entries.get(key))
            .cloned())
    }

    async fn put(
        &self,
        bucket: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), CacheError> {
        let mut buckets = self.buckets.write();

        let usage: usize = buckets.values().map(|b| b.total_size).sum();
        let replaced = buckets
            .get(bucket)
            .and_then(|b| b.entries.get(&key))
            .map(|old| old.size())
            .unwrap_or(0);
        if usage - replaced + response.size() > self.quota {
            return Err(CacheError::QuotaExceeded { quota: self.quota });
        }

        buckets
            .entry(bucket.to_string())
            .or_default()
            .put(key, response);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.buckets.read().keys().cloned().collect())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, CacheError> {
        let buckets = self.buckets.read();
        let mut keys: Vec<RequestKey> = buckets
            .get(bucket)
            .map(|b| b.entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, bucket: &str) -> Result<bool, CacheError> {
        let removed = self.buckets.write().remove(bucket).is_some();
        if removed {
            log::debug!("[SW Cache] Deleted bucket {}", bucket);
        }
        Ok(removed)
    }
}
