//! Request classification.
//!
//! Predicates are checked in a fixed order (skip, API, asset, page) and the
//! first one that holds wins.

use std::sync::Arc;

use url::{Origin, Url};

use crate::config::RouterConfig;
use crate::fetch::{Request, RequestDestination, RequestMethod};

/// Routing class of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Not ours: non-GET or cross-origin. Goes to the network untouched.
    Skip,
    /// Backend API call (network-first, API bucket).
    Api,
    /// Image or font (cache-first, static bucket).
    Asset,
    /// Everything else (network-first, pages bucket, offline substitute).
    Page,
}

/// Classifier bound to one configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Origin,
    config: Arc<RouterConfig>,
}

impl Classifier {
    /// Build a classifier for `origin`.
    pub fn new(origin: &Url, config: Arc<RouterConfig>) -> Self {
        Self {
            origin: origin.origin(),
            config,
        }
    }

    /// Classify a request.
    pub fn classify(&self, request: &Request) -> RouteClass {
        if request.method != RequestMethod::Get || request.url.origin() != self.origin {
            return RouteClass::Skip;
        }

        let path = request.url.path();
        if path.starts_with(&self.config.api_prefix) {
            return RouteClass::Api;
        }

        if matches!(
            request.destination,
            RequestDestination::Image | RequestDestination::Font
        ) {
            return RouteClass::Asset;
        }

        if extension(path).is_some_and(|ext| self.config.is_asset_extension(ext)) {
            return RouteClass::Asset;
        }

        RouteClass::Page
    }
}

/// File extension of the last path segment, if any.
fn extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}
