//! Request/response model and the network boundary.
//!
//! A live [`Response`] body can be consumed once. Whenever a response has
//! to go both to the caller and into a bucket it is split with
//! [`Response::clone_for_cache`], which yields the caller's handle and an
//! immutable [`CachedResponse`] snapshot. `Response` deliberately does not
//! implement `Clone`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RequestMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl RequestMethod {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the page is going to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// fetch()/XHR
    #[default]
    Empty,
    Document,
    Image,
    Font,
    Script,
    Style,
    Manifest,
    Audio,
    Video,
    Worker,
}

/// Request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    /// Top-level navigation
    Navigate,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Absolute request URL
    pub url: Url,
    /// HTTP method
    pub method: RequestMethod,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Request body (if any)
    pub body: Option<Vec<u8>>,
    /// Request destination
    pub destination: RequestDestination,
    /// Request mode
    pub mode: RequestMode,
}

impl Request {
    /// Create a plain `GET` request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: RequestMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            destination: RequestDestination::Empty,
            mode: RequestMode::Cors,
        }
    }

    /// Create a top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        Self {
            destination: RequestDestination::Document,
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    /// Set the method.
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the destination.
    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether this is a top-level navigation.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Cache key identifying this request.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, &self.url)
    }
}

/// Normalized request identity used as a bucket key.
///
/// The fragment never reaches the network, so it is not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    method: RequestMethod,
    url: String,
}

impl RequestKey {
    /// Build a key for `method` + `url`.
    pub fn new(method: RequestMethod, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }

    /// Key for a `GET` of `url`.
    pub fn get(url: &Url) -> Self {
        Self::new(RequestMethod::Get, url)
    }

    /// Method
    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// Normalized URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// The pre-seeded offline page standing in for a navigation.
    OfflineFallback,
}

/// A live response. The body is owned by whoever holds it.
#[derive(Debug)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Status text
    pub status_text: String,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    body: Vec<u8>,
    source: ResponseSource,
}

impl Response {
    /// Create a network response with an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: status_text_for(status).to_string(),
            headers: BTreeMap::new(),
            body: Vec::new(),
            source: ResponseSource::Network,
        }
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check if response is OK (2xx)
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Borrow the body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, returning the body.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Where this response came from.
    pub fn source(&self) -> ResponseSource {
        self.source
    }

    /// Split into the caller's handle and an independent storage snapshot.
    pub fn clone_for_cache(self) -> (Response, CachedResponse) {
        let snapshot = CachedResponse {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: Arc::new(self.headers.clone()),
            body: Arc::from(self.body.as_slice()),
        };
        (self, snapshot)
    }
}

/// Immutable point-in-time copy of a response, as stored in a bucket.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: u16,
    status_text: String,
    headers: Arc<BTreeMap<String, String>>,
    body: Arc<[u8]>,
}

impl CachedResponse {
    /// Status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Body bytes
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Size accounted against the storage quota (body + header bytes).
    pub fn size(&self) -> usize {
        let header_bytes: usize = self.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        self.body.len() + header_bytes
    }

    /// Materialize a fresh live response for a caller.
    pub fn to_response(&self, source: ResponseSource) -> Response {
        Response {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: (*self.headers).clone(),
            body: self.body.to_vec(),
            source,
        }
    }
}

/// Network boundary.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. `Err` means no response was obtained at all; an
    /// HTTP error status is still `Ok`.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Get status text for status code
pub fn status_text_for(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
