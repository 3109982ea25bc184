//! Request counters exported in Prometheus format via the `metrics` crate.
//!
//! Every endpoint family has one counter labelled by response `code` and request
//! `method`. Without an installed recorder the macros are no-ops, which is what
//! tests and runs without `--metrics-addr` get.

use axum::http::{Method, StatusCode};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

const NEW_REQUESTS_TOTAL: &str = "endpoint_new_requests_total";
const HEALTH_REQUESTS_TOTAL: &str = "endpoint_health_requests_total";
const TOKEN_REQUESTS_TOTAL: &str = "endpoint_token_requests_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    New,
    Health,
    Token,
}

impl Endpoint {
    fn metric_name(self) -> &'static str {
        match self {
            Endpoint::New => NEW_REQUESTS_TOTAL,
            Endpoint::Health => HEALTH_REQUESTS_TOTAL,
            Endpoint::Token => TOKEN_REQUESTS_TOTAL,
        }
    }
}

pub fn record_request(endpoint: Endpoint, status: StatusCode, method: &Method) {
    counter!(
        endpoint.metric_name(),
        "code" => status.as_u16().to_string(),
        "method" => method.to_string()
    )
    .increment(1);
}

/// Installs the global recorder and starts the `/metrics` listener on `addr`.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    tracing::info!("Prometheus metrics exporter listening on {}", addr);
    Ok(())
}
