//! Router configuration.
//!
//! Bucket names, the seed list, the API prefix and the static-asset
//! extension set are configuration rather than code. The defaults match the
//! Memos front-end; a JSON document with any subset of the fields can
//! override them:
//!
//! ```json
//! {
//!   "origin": "https://memos.example.com",
//!   "api_prefix": "/api/",
//!   "buckets": { "pages": "memos-v2", "assets": "memos-static-v1", "api": "memos-api-v1" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Default storage quota (50 MB).
pub const DEFAULT_QUOTA: usize = 50 * 1024 * 1024;

/// Names of the three buckets the router writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketNames {
    /// Primary bucket: app shell, offline page and visited pages.
    pub pages: String,
    /// Static images and fonts.
    pub assets: String,
    /// API responses.
    pub api: String,
}

impl BucketNames {
    /// Build the conventional `{prefix}-{version}` name triple.
    pub fn versioned(prefix: &str, version: &str) -> Self {
        Self {
            pages: format!("{}-{}", prefix, version),
            assets: format!("{}-static-{}", prefix, version),
            api: format!("{}-api-{}", prefix, version),
        }
    }

    /// Names kept on activation; everything else is stale.
    pub fn keep_set(&self) -> [&str; 3] {
        [self.pages.as_str(), self.assets.as_str(), self.api.as_str()]
    }

    /// Whether `name` belongs to the current version.
    pub fn contains(&self, name: &str) -> bool {
        self.keep_set().contains(&name)
    }
}

impl Default for BucketNames {
    fn default() -> Self {
        Self::versioned("memos", "v1")
    }
}

/// Offline router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Origin the worker is served from. Requests to other origins are
    /// never intercepted.
    pub origin: String,
    /// Path prefix of the backend API.
    pub api_prefix: String,
    /// Resources fetched and stored at install time.
    pub seed_paths: Vec<String>,
    /// Page served to offline navigations with no cached copy.
    pub offline_path: String,
    /// Bucket names for the current version.
    pub buckets: BucketNames,
    /// File extensions (without the dot, lowercase) treated as static assets.
    pub asset_extensions: Vec<String>,
    /// Storage quota in bytes for the bundled in-memory storage.
    pub quota: usize,
    /// Activate right after install instead of waiting for a
    /// `SKIP_WAITING` message or for older pages to close.
    pub skip_waiting: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            origin: String::from("http://localhost:5230"),
            api_prefix: String::from("/api/"),
            seed_paths: vec![String::from("/"), String::from("/offline")],
            offline_path: String::from("/offline"),
            buckets: BucketNames::default(),
            asset_extensions: [
                "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "avif", "woff", "woff2", "ttf",
                "otf", "eot",
            ]
            .iter()
            .map(|ext| String::from(*ext))
            .collect(),
            quota: DEFAULT_QUOTA,
            skip_waiting: true,
        }
    }
}

impl RouterConfig {
    /// Default configuration for a given origin.
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed origin URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|source| ConfigError::Origin {
            origin: self.origin.clone(),
            source,
        })
    }

    /// Resolve a same-origin path against the configured origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        let origin = self.origin_url()?;
        origin
            .join(path)
            .map_err(|source| ConfigError::Origin {
                origin: path.to_string(),
                source,
            })
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if origin.cannot_be_a_base() || origin.host_str().is_none() {
            return Err(ConfigError::Invalid(format!(
                "origin {} has no host",
                self.origin
            )));
        }

        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "api prefix {:?} must start with '/'",
                self.api_prefix
            )));
        }

        if !self.offline_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "offline path {:?} must start with '/'",
                self.offline_path
            )));
        }

        if !self.seed_paths.iter().any(|p| *p == self.offline_path) {
            return Err(ConfigError::Invalid(format!(
                "offline path {} is not in the seed list",
                self.offline_path
            )));
        }

        let names = self.buckets.keep_set();
        if names.iter().any(|n| n.is_empty()) {
            return Err(ConfigError::Invalid(String::from("empty bucket name")));
        }
        if names[0] == names[1] || names[0] == names[2] || names[1] == names[2] {
            return Err(ConfigError::Invalid(String::from(
                "bucket names must be distinct",
            )));
        }

        Ok(())
    }

    /// Whether `ext` (without the dot) is a static-asset extension.
    pub fn is_asset_extension(&self, ext: &str) -> bool {
        self.asset_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bucket_names() {
        let names = BucketNames::default();
        assert_eq!(names.pages, "memos-v1");
        assert_eq!(names.assets, "memos-static-v1");
        assert_eq!(names.api, "memos-api-v1");
        assert!(names.contains("memos-api-v1"));
        assert!(!names.contains("memos-v0"));
    }

    #[test]
    fn default_config_is_valid() {
        RouterConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = RouterConfig::from_json(
            r#"{ "origin": "https://memos.example.com", "buckets": { "pages": "memos-v2" } }"#,
        )
        .unwrap();
        assert_eq!(config.origin, "https://memos.example.com");
        assert_eq!(config.buckets.pages, "memos-v2");
        assert_eq!(config.buckets.assets, "memos-static-v1");
        assert_eq!(config.api_prefix, "/api/");
        assert_eq!(config.seed_paths, vec!["/", "/offline"]);
        assert!(config.skip_waiting);
    }

    #[test]
    fn skip_waiting_can_be_disabled() {
        let config = RouterConfig::from_json(r#"{ "skip_waiting": false }"#).unwrap();
        assert!(!config.skip_waiting);
    }

    #[test]
    fn offline_path_must_be_seeded() {
        let err = RouterConfig::from_json(r#"{ "seed_paths": ["/"] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_origin_rejected() {
        let err = RouterConfig::from_json(r#"{ "origin": "not a url" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Origin { .. }));
    }

    #[test]
    fn duplicate_bucket_names_rejected() {
        let mut config = RouterConfig::default();
        config.buckets.api = config.buckets.pages.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn asset_extension_case_insensitive() {
        let config = RouterConfig::default();
        assert!(config.is_asset_extension("PNG"));
        assert!(config.is_asset_extension("woff2"));
        assert!(!config.is_asset_extension("js"));
    }

    #[test]
    fn resolve_path() {
        let config = RouterConfig::for_origin("https://memos.example.com");
        let url = config.resolve("/offline").unwrap();
        assert_eq!(url.as_str(), "https://memos.example.com/offline");
    }
}
