use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Query};
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;

use super::service::Registry;
use super::types::parse_size;
use crate::error::HealthFailure;
use crate::metrics::{record_request, Endpoint};

/// Where `GET /` sends people.
pub const DOCS_URL: &str =
    "https://coreos.com/docs/cluster-management/setup/etcd-cluster-discovery/";

#[derive(Debug, Deserialize)]
pub struct NewParams {
    pub size: Option<String>,
}

pub async fn handle_home() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, DOCS_URL)])
}

pub async fn handle_new(
    Extension(registry): Extension<Arc<Registry>>,
    method: Method,
    params: Result<Query<NewParams>, QueryRejection>,
) -> (StatusCode, String) {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            tracing::warn!("Rejected /new request: {}", rejection);
            record_request(Endpoint::New, StatusCode::BAD_REQUEST, &method);
            return (StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let size = match parse_size(params.size.as_deref()) {
        Ok(size) => size,
        Err(e) => {
            tracing::warn!("Rejected /new request: {}", e);
            record_request(Endpoint::New, StatusCode::BAD_REQUEST, &method);
            return (StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match registry.create(size).await {
        Ok(token) => {
            record_request(Endpoint::New, StatusCode::OK, &method);
            (StatusCode::OK, registry.token_url(&token))
        }
        Err(e) => {
            tracing::error!("setupToken returned: {}", e);
            record_request(Endpoint::New, StatusCode::BAD_REQUEST, &method);
            (
                StatusCode::BAD_REQUEST,
                "Unable to generate token".to_string(),
            )
        }
    }
}

pub async fn handle_health(
    Extension(registry): Extension<Arc<Registry>>,
    method: Method,
) -> (StatusCode, String) {
    match registry.health_check().await {
        Ok(()) => {
            record_request(Endpoint::Health, StatusCode::OK, &method);
            (StatusCode::OK, "OK".to_string())
        }
        Err(e) => {
            tracing::error!("{}", e);
            record_request(Endpoint::Health, StatusCode::BAD_REQUEST, &method);
            let message = match e {
                HealthFailure::Setup(_) => "health failed to setupToken",
                HealthFailure::Teardown { .. } => "health failed to deleteToken",
            };
            (StatusCode::BAD_REQUEST, message.to_string())
        }
    }
}
