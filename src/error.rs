//! Error types shared by the registry, the proxy and startup.

use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The OS random source could not produce token bytes.
    #[error("couldn't generate a token: {0}")]
    Random(#[from] rand::Error),

    #[error("no token given")]
    EmptyToken,

    #[error("invalid cluster size {0:?}")]
    InvalidSize(String),

    /// Transport-level failure talking to the backing store (connect, timeout, body read).
    #[error("backing store request failed: {0}")]
    Backend(#[from] reqwest::Error),

    /// The backing store answered, but not with a success status.
    #[error("backing store rejected request with status {status}")]
    Rejected { status: StatusCode },

    #[error("invalid backing store url: {0}")]
    InvalidUrl(String),

    #[error("redirect from backing store carried no usable Location header")]
    MissingLocation,

    #[error("all {attempts} attempts at proxying to etcd failed")]
    ProxyExhausted { attempts: usize },
}

/// Which half of the health round trip failed.
#[derive(Debug, Error)]
pub enum HealthFailure {
    #[error("health failed to setupToken: {0}")]
    Setup(#[source] DiscoveryError),

    #[error("health failed to deleteToken {token}: {source}")]
    Teardown {
        token: String,
        #[source]
        source: DiscoveryError,
    },
}
