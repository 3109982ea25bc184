//! In-process stand-ins for the backing store, shared by the module tests.
//!
//! - `FakeEtcd`: a tiny subset of the etcd v2 keys API (create, get, recursive
//!   delete) held in memory.
//! - `ScriptedBackend`: answers `307` for a fixed number of requests, then `200`.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Router};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use crate::proxy::service::{Proxy, ProxyConfig};
use crate::registry::service::Registry;

pub const PUBLIC_HOST: &str = "https://discovery.test";

const KEYS_PREFIX: &str = "/v2/keys";

/// One request as seen by a fake backend.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Default)]
pub struct FakeEtcdState {
    pub keys: Mutex<BTreeMap<String, String>>,
    pub requests: Mutex<Vec<Seen>>,
}

impl FakeEtcdState {
    pub fn key_count(&self) -> usize {
        self.keys.lock().unwrap().len()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.keys.lock().unwrap().get(key).cloned()
    }

    pub fn requests(&self) -> Vec<Seen> {
        self.requests.lock().unwrap().clone()
    }
}

pub struct FakeEtcd {
    pub addr: SocketAddr,
    pub state: Arc<FakeEtcdState>,
}

impl FakeEtcd {
    pub async fn start() -> Self {
        let state = Arc::new(FakeEtcdState::default());
        let router = Router::new()
            .fallback(fake_etcd_handler)
            .layer(Extension(state.clone()));
        let addr = spawn(router).await;
        Self { addr, state }
    }
}

pub struct ScriptedBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    /// Redirects the first `redirects` requests to `location_host`, keeping the
    /// request path and query, then answers `200` with body `scripted`.
    pub async fn start(location_host: Option<String>, redirects: usize) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Script {
            location_host,
            redirects,
            hits: hits.clone(),
        });
        let router = Router::new()
            .fallback(scripted_handler)
            .layer(Extension(script));
        let addr = spawn(router).await;
        Self { addr, hits }
    }

    /// Redirects the first `redirects` requests back to itself, then answers `200`.
    pub async fn self_redirect(redirects: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Script {
            location_host: Some(addr.to_string()),
            redirects,
            hits: hits.clone(),
        });
        let router = Router::new()
            .fallback(scripted_handler)
            .layer(Extension(script));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self { addr, hits }
    }

    /// A backend that redirects every request back to itself, forever.
    pub async fn redirect_loop() -> Self {
        Self::self_redirect(usize::MAX).await
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

struct Script {
    location_host: Option<String>,
    redirects: usize,
    hits: Arc<AtomicUsize>,
}

pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn http_url(addr: SocketAddr) -> reqwest::Url {
    reqwest::Url::parse(&format!("http://{}", addr)).unwrap()
}

pub fn proxy_for(addr: SocketAddr, config: ProxyConfig) -> Arc<Proxy> {
    Arc::new(Proxy::new(&http_url(addr), config).unwrap())
}

pub fn registry_for(addr: SocketAddr) -> Arc<Registry> {
    Arc::new(Registry::new(
        proxy_for(addr, ProxyConfig::default()),
        PUBLIC_HOST,
    ))
}

async fn scripted_handler(Extension(script): Extension<Arc<Script>>, uri: Uri) -> Response {
    let hit = script.hits.fetch_add(1, Ordering::SeqCst);

    if hit < script.redirects {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
        if let Some(host) = &script.location_host {
            let location = format!("http://{}{}", host, path_and_query);
            response
                .headers_mut()
                .insert(header::LOCATION, location.parse().unwrap());
        }
        return response;
    }

    (StatusCode::OK, "scripted").into_response()
}

async fn fake_etcd_handler(
    Extension(state): Extension<Arc<FakeEtcdState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(Seen {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: body.clone(),
    });

    let Some(key) = uri.path().strip_prefix(KEYS_PREFIX) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let key = key.trim_end_matches('/').to_string();
    let query = uri.query().unwrap_or_default();
    let mut keys = state.keys.lock().unwrap();

    match method.as_str() {
        "PUT" => {
            let exists = keys.contains_key(&key);
            if query.contains("prevExist=false") && exists {
                return etcd_error(StatusCode::PRECONDITION_FAILED, 105, "Key already exists", &key);
            }
            let value = form_value(&body).unwrap_or_default();
            keys.insert(key.clone(), value.clone());
            let (status, action) = if exists {
                (StatusCode::OK, "set")
            } else {
                (StatusCode::CREATED, "create")
            };
            json_response(
                status,
                json!({ "action": action, "node": { "key": key, "value": value } }),
            )
        }
        "GET" => {
            if let Some(value) = keys.get(&key) {
                return json_response(
                    StatusCode::OK,
                    json!({ "action": "get", "node": { "key": key, "value": value } }),
                );
            }
            let prefix = format!("{}/", key);
            if keys.keys().any(|k| k.starts_with(&prefix)) {
                return json_response(
                    StatusCode::OK,
                    json!({ "action": "get", "node": { "key": key, "dir": true } }),
                );
            }
            etcd_error(StatusCode::NOT_FOUND, 100, "Key not found", &key)
        }
        "DELETE" => {
            let prefix = format!("{}/", key);
            let before = keys.len();
            let recursive = query.contains("recursive=true");
            keys.retain(|k, _| *k != key && !(recursive && k.starts_with(&prefix)));
            if keys.len() == before {
                return etcd_error(StatusCode::NOT_FOUND, 100, "Key not found", &key);
            }
            json_response(
                StatusCode::OK,
                json!({ "action": "delete", "node": { "key": key, "dir": recursive } }),
            )
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

fn form_value(body: &[u8]) -> Option<String> {
    let body = std::str::from_utf8(body).ok()?;
    body.split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "value")
        .map(|(_, value)| value.to_string())
}

fn etcd_error(status: StatusCode, code: u32, message: &str, key: &str) -> Response {
    json_response(
        status,
        json!({ "errorCode": code, "message": message, "cause": key, "index": 1 }),
    )
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response.headers_mut().insert(
        "x-etcd-index",
        header::HeaderValue::from_static("1"),
    );
    response
}
