use axum::http::{Method, StatusCode};
use std::sync::Arc;

use super::types::{KeysResponse, Token};
use crate::error::{DiscoveryError, HealthFailure, Result};
use crate::proxy::protocol::CONFIG_SIZE_KEY;
use crate::proxy::service::{Proxy, ProxyRequest};

/// Creates, reads and removes tokens in the backing store.
pub struct Registry {
    proxy: Arc<Proxy>,
    /// Base of the URLs handed back to clients, no trailing slash.
    public_host: String,
}

impl Registry {
    pub fn new(proxy: Arc<Proxy>, public_host: impl Into<String>) -> Self {
        let public_host = public_host.into().trim_end_matches('/').to_string();
        Self { proxy, public_host }
    }

    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    /// The discovery URL a client receives for `token`.
    pub fn token_url(&self, token: &Token) -> String {
        format!("{}/{}", self.public_host, token)
    }

    /// Allocates a token seeded with `size`.
    ///
    /// Uses `prevExist=false`, so a collision with an existing token is rejected by
    /// etcd instead of silently overwriting it.
    pub async fn create(&self, size: u32) -> Result<Token> {
        let token = Token::generate()?;

        let request = ProxyRequest::new(Method::PUT, format!("{}/{}", token, CONFIG_SIZE_KEY))
            .query("prevExist=false")
            .form(format!("value={}", size));

        let response = self.proxy.forward(&request).await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Rejected {
                status: response.status(),
            });
        }

        tracing::info!("New cluster created {}", token);
        Ok(token)
    }

    /// Recursively removes `_etcd/registry/<token>`.
    pub async fn delete(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(DiscoveryError::EmptyToken);
        }

        let request = ProxyRequest::new(Method::DELETE, token).query("recursive=true");

        let response = self.proxy.forward(&request).await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Rejected {
                status: response.status(),
            });
        }

        tracing::debug!("Deleted cluster {}", token);
        Ok(())
    }

    /// Reads back the size stored for `token`.
    ///
    /// A missing token surfaces as `Rejected { status: 404 }`.
    pub async fn size(&self, token: &Token) -> Result<u32> {
        let request = ProxyRequest::new(Method::GET, format!("{}/{}", token, CONFIG_SIZE_KEY));

        let response = self.proxy.forward(&request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Rejected { status });
        }

        let body: KeysResponse = response.json().await?;
        body.node
            .value
            .as_deref()
            .and_then(|v| v.parse().ok())
            .ok_or(DiscoveryError::Rejected {
                status: StatusCode::UNPROCESSABLE_ENTITY,
            })
    }

    /// Create-then-delete round trip against the backing store.
    pub async fn health_check(&self) -> std::result::Result<(), HealthFailure> {
        let token = self.create(0).await.map_err(HealthFailure::Setup)?;

        self.delete(token.as_str())
            .await
            .map_err(|source| HealthFailure::Teardown {
                token: token.to_string(),
                source,
            })
    }
}
