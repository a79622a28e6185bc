//! Routing strategies.
//!
//! | Class | Order                    | Writes to      | On network error           |
//! |-------|--------------------------|----------------|----------------------------|
//! | API   | network, then cache      | API bucket     | cached copy or nothing     |
//! | Asset | cache, then network      | static bucket  | error propagates           |
//! | Page  | network, then cache      | pages bucket   | cached copy, offline page  |
//!
//! Only 2xx responses are written back, and write-backs never hold up the
//! response.

use std::sync::Arc;

use url::Url;

use crate::cache::CacheStorage;
use crate::error::FetchError;
use crate::fetch::{Fetcher, Request, RequestKey, Response, ResponseSource};
use crate::task::BackgroundTasks;

/// Result of a strategy: `Ok(None)` means neither network nor cache could
/// answer, and the page has to treat the resource as unavailable.
pub type StrategyResult = Result<Option<Response>, FetchError>;

/// Shared handles the strategies run against.
#[derive(Clone)]
pub struct StrategyContext {
    pub caches: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub background: BackgroundTasks,
}

impl StrategyContext {
    /// Cache read that treats a storage failure as a miss.
    async fn lookup(
        &self,
        bucket: &str,
        key: &RequestKey,
        source: ResponseSource,
    ) -> Option<Response> {
        match self.caches.match_in(bucket, key).await {
            Ok(hit) => hit.map(|cached| cached.to_response(source)),
            Err(e) => {
                log::debug!("[SW Router] cache read {} in {} failed: {}", key, bucket, e);
                None
            }
        }
    }

    /// Return the live response and, if it is a success, store a copy.
    fn write_back(&self, bucket: &str, request: &Request, response: Response) -> Response {
        if !response.ok() {
            return response;
        }

        let (live, snapshot) = response.clone_for_cache();
        let caches = self.caches.clone();
        let bucket = bucket.to_string();
        let key = request.key();
        self.background
            .spawn_best_effort(format!("write-back {}", key), async move {
                caches.put(&bucket, key, snapshot).await
            });
        live
    }
}

/// Network-first for API calls.
pub async fn network_first_api(
    ctx: &StrategyContext,
    bucket: &str,
    request: &Request,
) -> StrategyResult {
    match ctx.fetcher.fetch(request).await {
        Ok(response) => Ok(Some(ctx.write_back(bucket, request, response))),
        Err(e) => {
            log::debug!("[SW Router] {} offline ({}), trying {}", request.url, e, bucket);
            Ok(ctx.lookup(bucket, &request.key(), ResponseSource::Cache).await)
        }
    }
}

/// Cache-first for static assets.
///
/// A miss followed by a network failure is reported to the caller.
pub async fn cache_first_asset(
    ctx: &StrategyContext,
    bucket: &str,
    request: &Request,
) -> StrategyResult {
    if let Some(hit) = ctx.lookup(bucket, &request.key(), ResponseSource::Cache).await {
        return Ok(Some(hit));
    }

    let response = ctx.fetcher.fetch(request).await?;
    Ok(Some(ctx.write_back(bucket, request, response)))
}

/// Network-first for pages, with the offline page as the last resort for
/// navigations.
pub async fn network_first_page(
    ctx: &StrategyContext,
    bucket: &str,
    offline_url: &Url,
    request: &Request,
) -> StrategyResult {
    let error = match ctx.fetcher.fetch(request).await {
        Ok(response) => return Ok(Some(ctx.write_back(bucket, request, response))),
        Err(e) => e,
    };
    log::debug!("[SW Router] {} offline ({}), trying {}", request.url, error, bucket);

    if let Some(hit) = ctx.lookup(bucket, &request.key(), ResponseSource::Cache).await {
        return Ok(Some(hit));
    }

    if request.is_navigation() {
        let offline_key = RequestKey::get(offline_url);
        let fallback = ctx
            .lookup(bucket, &offline_key, ResponseSource::OfflineFallback)
            .await;
        if fallback.is_some() {
            log::info!("[SW Router] Serving offline page for {}", request.url);
            return Ok(fallback);
        }
    }

    Ok(None)
}
