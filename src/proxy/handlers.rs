use axum::body::{Body, Bytes};
use axum::extract::Extension;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::protocol::{copy_response_headers, registry_path};
use super::service::{Proxy, ProxyRequest};
use crate::metrics::{record_request, Endpoint};
use crate::registry::types::Token;

static CLUSTER_METHODS: [Method; 2] = [Method::GET, Method::PUT];
static MEMBER_METHODS: [Method; 3] = [Method::GET, Method::PUT, Method::DELETE];

/// Shape of a path addressed to a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRoute {
    /// `/<token>` or `/<token>/`
    Cluster(Token),
    /// `/<token>/<member>` and anything deeper, e.g. `/<token>/_config/size`.
    Member(Token),
}

impl TokenRoute {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.strip_prefix('/')?;
        let (head, rest) = match trimmed.split_once('/') {
            Some((head, rest)) => (head, rest),
            None => (trimmed, ""),
        };

        let token = Token::parse(head)?;
        // Also rejects `..` anywhere below the token.
        let rest = registry_path(rest)?;

        if rest.is_empty() {
            Some(TokenRoute::Cluster(token))
        } else {
            Some(TokenRoute::Member(token))
        }
    }

    pub fn token(&self) -> &Token {
        match self {
            TokenRoute::Cluster(token) | TokenRoute::Member(token) => token,
        }
    }

    pub fn allowed_methods(&self) -> &'static [Method] {
        match self {
            TokenRoute::Cluster(_) => &CLUSTER_METHODS,
            TokenRoute::Member(_) => &MEMBER_METHODS,
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods().contains(method)
    }
}

/// Relays token traffic to the backing store. Installed as the router fallback so
/// that token shape and method checks happen in one place.
pub async fn handle_token(
    Extension(proxy): Extension<Arc<Proxy>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(route) = TokenRoute::parse(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !route.allows(&method) {
        return method_not_allowed(&route);
    }

    tracing::debug!("Proxying {} {} for token {}", method, uri, route.token());

    let request = ProxyRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    let upstream = match proxy.forward(&request).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!("Error making request: {}", e);
            record_request(Endpoint::Token, StatusCode::INTERNAL_SERVER_ERROR, &method);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let body = match upstream.bytes().await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Error reading etcd response body: {}", e);
            record_request(Endpoint::Token, StatusCode::INTERNAL_SERVER_ERROR, &method);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    copy_response_headers(&upstream_headers, response.headers_mut());

    record_request(Endpoint::Token, status, &method);
    response
}

fn method_not_allowed(route: &TokenRoute) -> Response {
    let allow = route
        .allowed_methods()
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}
