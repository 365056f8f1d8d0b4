//! reqwest-backed transport.
//!
//! One `HttpSession` owns one `reqwest::Client` (one connection pool), so all
//! sends of a wave reuse warm connections. Headers, URL and body are
//! converted once when the session opens; a malformed template therefore
//! fails at setup rather than on every send.
pub mod error;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use volley_traits::{BoxError, Connector, Reply, RequestDescriptor, Session};

use crate::error::{HttpError, Result};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct HttpConnector {
    timeout: Duration,
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Connector for HttpConnector {
    type Session = HttpSession;

    fn open(&self, request: &RequestDescriptor) -> std::result::Result<HttpSession, BoxError> {
        Ok(HttpSession::open(request, self.timeout)?)
    }
}

/// Pooled session bound to one request.
#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::Client,
    url: reqwest::Url,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpSession {
    pub fn open(request: &RequestDescriptor, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| HttpError::Url(format!("{}: {e}", request.url)))?;
        let headers = header_map(&request.headers)?;
        let body = Bytes::from(serde_json::to_vec(&request.body)?);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        tracing::debug!(%url, headers = headers.len(), body_len = body.len(), "http session opened");
        Ok(Self {
            client,
            url,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn send(&self) -> std::result::Result<Reply, BoxError> {
        let started = Instant::now();
        let response = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .body(self.body.clone())
            .send()
            .await?;
        let headers_after = started.elapsed();
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Reply {
            status,
            body,
            headers_after: Some(headers_after),
        })
    }
}

/// Convert template headers to a `HeaderMap`.
///
/// `Content-Length` is dropped (the client computes it) and
/// `Content-Type: application/json` is added when missing.
pub fn header_map(headers: &IndexMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len() + 1);
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| HttpError::HeaderName(key.clone()))?;
        if name == CONTENT_LENGTH {
            continue;
        }
        let value =
            HeaderValue::from_str(value).map_err(|_| HttpError::HeaderValue(key.clone()))?;
        map.insert(name, value);
    }
    if !map.contains_key(CONTENT_TYPE) {
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    Ok(map)
}
