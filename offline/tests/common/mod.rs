//! Shared fixtures for the end-to-end tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use memos_offline::{
    FetchError, Fetcher, MemoryCacheStorage, Request, RequestMethod, Response, RouterConfig,
    WorkerHost,
};
use url::Url;

pub const ORIGIN: &str = "https://memos.example.com";

/// Scripted network: per-path status/body, an offline switch and a call log.
#[derive(Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (u16, Vec<u8>)>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    seen: Mutex<Vec<(RequestMethod, String)>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `path` (path + query) with `status` and `body`.
    pub fn route(&self, path: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.as_bytes().to_vec()));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(RequestMethod, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((request.method, request.url.to_string()));

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network(String::from("connection refused")));
        }

        let mut path = request.url.path().to_string();
        if let Some(query) = request.url.query() {
            path.push('?');
            path.push_str(query);
        }
        let routes = self.routes.lock().unwrap();
        Ok(match routes.get(&path) {
            Some((status, body)) => Response::new(*status).with_body(body.clone()),
            None => Response::new(404),
        })
    }
}

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Network with both seed resources available.
pub fn seeded_network() -> Arc<ScriptedNetwork> {
    let network = ScriptedNetwork::new();
    network.route("/", 200, "<html>app shell</html>");
    network.route("/offline", 200, "<html>you are offline</html>");
    network
}

/// Host over fresh in-memory storage.
pub fn host(network: Arc<ScriptedNetwork>) -> (Arc<WorkerHost>, Arc<MemoryCacheStorage>) {
    let storage = Arc::new(MemoryCacheStorage::new());
    let host = WorkerHost::new(RouterConfig::for_origin(ORIGIN), storage.clone(), network).unwrap();
    (Arc::new(host), storage)
}

/// Host that has already installed and activated.
pub async fn active_host(
    network: Arc<ScriptedNetwork>,
) -> (Arc<WorkerHost>, Arc<MemoryCacheStorage>) {
    let (host, storage) = host(network);
    host.start().await.unwrap();
    (host, storage)
}
