use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use reqwest::redirect::Policy;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;

use super::leader::{authority, LeaderCache};
use super::protocol::{copy_request_headers, follows_redirect, registry_url};
use crate::error::{DiscoveryError, Result};

/// Attempts per proxied request before giving up on a redirect chain.
pub const DEFAULT_MAX_ATTEMPTS: usize = 11;
/// Per-request timeout for calls into the backing store.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub max_attempts: usize,
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A request to replay against the registry namespace.
///
/// `path` is relative to the registry root (`<token>/<member>`), the body is
/// buffered so it can be re-sent on every attempt.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets an `application/x-www-form-urlencoded` body, as the keys API expects for writes.
    pub fn form(mut self, body: impl Into<Bytes>) -> Self {
        self.headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.body = body.into();
        self
    }
}

/// Forwards requests to whichever etcd member is currently believed to be leader.
pub struct Proxy {
    leader: Arc<LeaderCache>,
    scheme: String,
    config: ProxyConfig,
    http_client: reqwest::Client,
}

impl Proxy {
    /// Builds a proxy whose leader cache starts at `etcd`'s authority.
    pub fn new(etcd: &Url, config: ProxyConfig) -> Result<Self> {
        let leader = Arc::new(LeaderCache::new(authority(etcd)));
        Self::with_leader(etcd.scheme(), leader, config)
    }

    pub fn with_leader(scheme: &str, leader: Arc<LeaderCache>, config: ProxyConfig) -> Result<Self> {
        // Redirects are handled by `forward`; the client must hand them back untouched.
        let http_client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            leader,
            scheme: scheme.to_string(),
            config,
            http_client,
        })
    }

    pub fn leader(&self) -> &Arc<LeaderCache> {
        &self.leader
    }

    /// Sends `req` to the cached leader, following `307`s for PUT and DELETE.
    ///
    /// # Returns
    /// * The first response that is not a followed redirect, whatever its status.
    /// * `Err(Backend)` on any transport failure; there is no retry for those.
    /// * `Err(ProxyExhausted)` once `max_attempts` redirects have been chased.
    pub async fn forward(&self, req: &ProxyRequest) -> Result<reqwest::Response> {
        for attempt in 0..self.config.max_attempts {
            let leader = self.leader.get().await;
            let url = registry_url(&self.scheme, &leader, &req.path, req.query.as_deref())?;

            let mut headers = HeaderMap::new();
            copy_request_headers(&req.headers, &mut headers);

            let response = self
                .http_client
                .request(req.method.clone(), url.clone())
                .headers(headers)
                .body(req.body.clone())
                .send()
                .await?;

            if response.status() == StatusCode::TEMPORARY_REDIRECT && follows_redirect(&req.method)
            {
                let next = redirect_target(&url, response.headers())
                    .ok_or(DiscoveryError::MissingLocation)?;
                tracing::debug!(
                    "{} {} redirected to {} (attempt {})",
                    req.method,
                    url,
                    next,
                    attempt + 1
                );
                self.leader.set(next).await;
                continue;
            }

            return Ok(response);
        }

        Err(DiscoveryError::ProxyExhausted {
            attempts: self.config.max_attempts,
        })
    }
}

/// `host:port` named by a redirect's `Location`, resolved against the request URL.
fn redirect_target(request_url: &Url, headers: &HeaderMap) -> Option<String> {
    let location = headers.get(header::LOCATION)?.to_str().ok()?;
    let target = request_url.join(location).ok()?;
    let host = authority(&target);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}
