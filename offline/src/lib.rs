//! Memos Offline Router
//!
//! Intercepts the web front-end's outbound requests and decides, per
//! request, whether to answer from a named cache bucket, from the network,
//! or both with a defined precedence. Also owns the lifecycle of those
//! buckets and the page-to-worker control channel.
//!
//! # Architecture
//!
//! - `config`: bucket names, seed list, API prefix, asset extensions
//! - `fetch`: request/response model, single-read duplication, network port
//! - `cache`: cache storage port + in-memory buckets with quota
//! - `classify`: request classifier (skip / API / asset / page)
//! - `strategy`: network-first and cache-first routing strategies
//! - `task`: best-effort background write-backs
//! - `lifecycle`: worker state machine (installing → waiting → activating → active)
//! - `manager`: install seeding, activate cleanup, clear-all
//! - `router`: single `route(event)` dispatcher
//! - `host`: platform adapter around the router
//! - `control`: `SKIP_WAITING` / `CLEAR_CACHE` message channel
//! - `net`: `reqwest` network fetcher (feature `http`)

pub mod cache;
pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod fetch;
pub mod host;
pub mod lifecycle;
pub mod manager;
#[cfg(feature = "http")]
pub mod net;
pub mod router;
pub mod strategy;
pub mod task;

pub use cache::{CacheStorage, MemoryCacheStorage};
pub use classify::{Classifier, RouteClass};
pub use config::{BucketNames, RouterConfig};
pub use control::{ControlChannel, ControlMessage, ControlSender};
pub use error::{
    CacheError, ConfigError, ControlError, FetchError, InstallError, LifecycleError, RouterError,
};
pub use fetch::{
    CachedResponse, Fetcher, Request, RequestDestination, RequestKey, RequestMethod, RequestMode,
    Response, ResponseSource,
};
pub use host::WorkerHost;
pub use lifecycle::{LifecycleEvent, WorkerFlags, WorkerState};
pub use manager::CacheLifecycleManager;
#[cfg(feature = "http")]
pub use net::HttpFetcher;
pub use router::{EventOutcome, LifecycleListener, OfflineRouter, WorkerEvent};
