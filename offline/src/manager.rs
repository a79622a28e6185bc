//! Cache lifecycle management.
//!
//! Owns bucket creation and deletion: seeding the primary bucket on install,
//! dropping stale versions on activate, and wiping everything on request.

use std::sync::Arc;

use crate::cache::CacheStorage;
use crate::config::RouterConfig;
use crate::error::{CacheError, InstallError};
use crate::fetch::{Fetcher, Request};

/// Bucket lifecycle operations.
pub struct CacheLifecycleManager {
    config: Arc<RouterConfig>,
    caches: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
}

impl CacheLifecycleManager {
    /// Create a manager over the given storage and network.
    pub fn new(
        config: Arc<RouterConfig>,
        caches: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            config,
            caches,
            fetcher,
        }
    }

    /// Open the primary bucket and store every seed resource.
    ///
    /// All seeds are fetched before anything is written, so a failed
    /// install leaves no partial seed set behind.
    pub async fn on_install(&self) -> Result<(), InstallError> {
        let bucket = &self.config.buckets.pages;
        self.caches.open(bucket).await?;

        let mut seeds = Vec::with_capacity(self.config.seed_paths.len());
        for path in &self.config.seed_paths {
            let url = self
                .config
                .resolve(path)
                .map_err(|_| InstallError::InvalidPath(path.clone()))?;
            let request = Request::get(url);

            let response = self.fetcher.fetch(&request).await.map_err(|source| {
                InstallError::SeedFetch {
                    path: path.clone(),
                    source,
                }
            })?;
            if !response.ok() {
                return Err(InstallError::SeedStatus {
                    path: path.clone(),
                    status: response.status,
                });
            }

            let (_, snapshot) = response.clone_for_cache();
            seeds.push((request.key(), snapshot));
        }

        for (key, snapshot) in seeds {
            self.caches.put(bucket, key, snapshot).await?;
        }

        log::info!(
            "[SW Cache] Seeded {} with {} resources",
            bucket,
            self.config.seed_paths.len()
        );
        Ok(())
    }

    /// Delete every bucket that is not part of the current version.
    /// Returns the deleted names.
    pub async fn on_activate(&self) -> Result<Vec<String>, CacheError> {
        let names = self.caches.keys().await?;
        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| !self.config.buckets.contains(name))
            .collect();

        let deleted = self.delete_all(stale).await;
        if !deleted.is_empty() {
            log::info!("[SW Cache] Dropped stale buckets: {:?}", deleted);
        }
        Ok(deleted)
    }

    /// Delete every bucket regardless of version. Returns the deleted names.
    pub async fn on_clear_all(&self) -> Result<Vec<String>, CacheError> {
        let names = self.caches.keys().await?;
        let deleted = self.delete_all(names).await;
        log::info!("[SW Cache] Cleared {} buckets", deleted.len());
        Ok(deleted)
    }

    async fn delete_all(&self, names: Vec<String>) -> Vec<String> {
        let mut deleted = Vec::with_capacity(names.len());
        for name in names {
            match self.caches.delete(&name).await {
                Ok(true) => deleted.push(name),
                Ok(false) => {}
                Err(e) => log::warn!("[SW Cache] Failed to delete bucket {}: {}", name, e),
            }
        }
        deleted
    }
}
