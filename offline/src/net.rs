//! HTTP network adapter over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::FetchError;
use crate::fetch::{Fetcher, Request, RequestMethod, Response};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn method(method: RequestMethod) -> reqwest::Method {
    match method {
        RequestMethod::Get => reqwest::Method::GET,
        RequestMethod::Head => reqwest::Method::HEAD,
        RequestMethod::Post => reqwest::Method::POST,
        RequestMethod::Put => reqwest::Method::PUT,
        RequestMethod::Delete => reqwest::Method::DELETE,
        RequestMethod::Patch => reqwest::Method::PATCH,
        RequestMethod::Options => reqwest::Method::OPTIONS,
    }
}

fn headers(request: &Request) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::with_capacity(request.headers.len());
    for (name, value) in &request.headers {
        let invalid = |e: &dyn std::fmt::Display| {
            FetchError::InvalidRequest(format!("header {}: {}", name, e))
        };
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(&e))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(&e))?;
        map.insert(header, value);
    }
    Ok(map)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .request(method(request.method), request.url.clone())
            .headers(headers(request)?);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let reply = builder
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let mut response = Response::new(reply.status().as_u16());
        if let Some(reason) = reply.status().canonical_reason() {
            response.status_text = reason.to_string();
        }
        for (name, value) in reply.headers() {
            if let Ok(value) = value.to_str() {
                response = response.with_header(name.as_str(), value);
            }
        }

        let body = reply
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(response.with_body(body.to_vec()))
    }
}
