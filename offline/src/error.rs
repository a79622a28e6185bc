//! Error types for the offline router.
//!
//! Only [`InstallError`] is fatal. Everything else is handled inside the
//! strategy or lifecycle step that produced it.

use thiserror::Error;

use crate::lifecycle::WorkerState;

/// Network boundary failure.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request never produced a response (offline, DNS, reset, ...).
    #[error("network error: {0}")]
    Network(String),
    /// The request could not be turned into a network call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Cache storage failure.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Storing the entry would exceed the storage quota.
    #[error("cache quota exceeded ({quota} bytes)")]
    QuotaExceeded { quota: usize },
    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Seed population failure during install.
#[derive(Debug, Clone, Error)]
pub enum InstallError {
    /// A seed resource could not be fetched.
    #[error("failed to fetch seed resource {path}: {source}")]
    SeedFetch {
        path: String,
        #[source]
        source: FetchError,
    },
    /// A seed resource answered with a non-success status.
    #[error("seed resource {path} answered {status}")]
    SeedStatus { path: String, status: u16 },
    /// A seed resource could not be stored.
    #[error("failed to store seed resource: {0}")]
    Cache(#[from] CacheError),
    /// A seed path does not resolve against the worker origin.
    #[error("invalid seed path {0}")]
    InvalidPath(String),
}

/// Malformed page-to-worker message.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The payload is not a valid control message.
    #[error("malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The control channel has shut down.
    #[error("control channel closed")]
    Closed,
}

/// Invalid router configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    /// The configured origin is not an absolute URL.
    #[error("invalid origin {origin:?}: {source}")]
    Origin {
        origin: String,
        #[source]
        source: url::ParseError,
    },
    /// A field failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, Error)]
#[error("invalid lifecycle transition {from:?} -> {to:?}")]
pub struct LifecycleError {
    pub from: WorkerState,
    pub to: WorkerState,
}

/// Top-level error of [`crate::router::OfflineRouter::route`].
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Router result alias.
pub type Result<T, E = RouterError> = core::result::Result<T, E>;
