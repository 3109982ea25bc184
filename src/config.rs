//! Runtime configuration.
//!
//! Flags are parsed with `clap`; each one falls back to a `DISC_*` environment
//! variable and then to a default. `Cli` is the raw surface, `Config` the
//! validated form the rest of the crate consumes.

use clap::Parser;
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::proxy::leader::authority;
use crate::proxy::service::{ProxyConfig, DEFAULT_MAX_ATTEMPTS};

pub const DEFAULT_ETCD: &str = "http://127.0.0.1:2379";
pub const DEFAULT_HOST: &str = "https://discovery.etcd.io";
pub const DEFAULT_ADDR: &str = "0.0.0.0:8087";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Exit status for usage and configuration errors.
pub const EXIT_USAGE: i32 = 2;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "discovery",
    about = "Hands out cluster discovery tokens and proxies member registration to etcd"
)]
pub struct Cli {
    /// Client URL of the backing etcd cluster (scheme://host:port only).
    #[arg(long, env = "DISC_ETCD", default_value = DEFAULT_ETCD)]
    pub etcd: String,

    /// Externally visible base URL used to build returned token URLs.
    #[arg(long, env = "DISC_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Address the HTTP server listens on.
    #[arg(long, env = "DISC_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,

    /// Serve Prometheus metrics on this address. Disabled when unset.
    #[arg(long, env = "DISC_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Upper bound on redirect-following attempts per proxied request.
    #[arg(long, env = "DISC_PROXY_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub proxy_attempts: usize,

    /// Per-request timeout for calls to etcd, in milliseconds.
    #[arg(long, env = "DISC_ETCD_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub etcd_timeout_ms: u64,

    /// Log filter directive (overridden by RUST_LOG when set).
    #[arg(long, env = "DISC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid --{flag} value {value:?}: {reason}")]
    InvalidUrl {
        flag: &'static str,
        value: String,
        reason: String,
    },

    #[error("--proxy-attempts must be at least 1")]
    NoAttempts,

    #[error("--etcd-timeout-ms must be greater than 0")]
    ZeroTimeout,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub etcd: Url,
    /// `host:port` of `etcd`; the initial value of the leader cache.
    pub initial_leader: String,
    /// Base of returned token URLs, without a trailing slash.
    pub public_host: String,
    pub listen_addr: SocketAddr,
    pub metrics_addr: Option<SocketAddr>,
    pub proxy: ProxyConfig,
    pub log_level: String,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let etcd = validate_base_url("etcd", &cli.etcd)?;
        let public = validate_base_url("host", &cli.host)?;

        if cli.proxy_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if cli.etcd_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Self {
            initial_leader: authority(&etcd),
            public_host: public.as_str().trim_end_matches('/').to_string(),
            etcd,
            listen_addr: cli.addr,
            metrics_addr: cli.metrics_addr,
            proxy: ProxyConfig {
                max_attempts: cli.proxy_attempts,
                timeout: Duration::from_millis(cli.etcd_timeout_ms),
            },
            log_level: cli.log_level,
        })
    }
}

/// Accepts only `http(s)://host[:port]`, optionally with a bare trailing `/`.
pub fn validate_base_url(flag: &'static str, value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidUrl {
        flag,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(value).map_err(|e| invalid(&e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("credentials are not allowed"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(invalid("path is not allowed"));
    }
    if url.query().is_some() {
        return Err(invalid("query is not allowed"));
    }
    if url.fragment().is_some() {
        return Err(invalid("fragment is not allowed"));
    }

    Ok(url)
}
