//! Backing Store Protocol
//!
//! Path layout and header rules for requests the proxy sends to etcd's v2 keys API.

use axum::http::{header, HeaderMap, HeaderName, Method};
use reqwest::Url;

use crate::error::{DiscoveryError, Result};

// --- Key Namespace ---

/// Prefix every proxied path is rewritten under.
pub const REGISTRY_PREFIX: &str = "/v2/keys/_etcd/registry";
/// Sub-key holding a token's requested cluster size.
pub const CONFIG_SIZE_KEY: &str = "_config/size";

// --- Header Rules ---

/// Headers the outbound HTTP client derives itself; copying them from the inbound
/// request would describe the wrong host or the wrong framing.
const CLIENT_MANAGED_HEADERS: [HeaderName; 5] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TRAILER,
    header::CONNECTION,
];

/// Framing headers of an etcd response that the server recomputes when relaying.
const RELAY_SKIPPED_HEADERS: [HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

/// Normalizes an inbound path into its registry-relative form.
///
/// Empty and `.` segments are dropped, matching how the keys API treats them.
/// Returns `None` for paths containing `..` or a backslash, which could climb out
/// of the registry namespace once the outbound URL is parsed. Dots are compared
/// after undoing `%2e`, since URL parsing resolves `%2e%2e` like `..`.
pub fn registry_path(path: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        if segment.contains('\\') {
            return None;
        }
        match segment.to_ascii_lowercase().replace("%2e", ".").as_str() {
            "" | "." => continue,
            ".." => return None,
            _ => segments.push(segment),
        }
    }
    Some(segments.join("/"))
}

/// Full outbound URL for `path` on the given etcd member.
pub fn registry_url(scheme: &str, leader: &str, path: &str, query: Option<&str>) -> Result<Url> {
    let relative = registry_path(path)
        .ok_or_else(|| DiscoveryError::InvalidUrl(format!("path escapes registry: {}", path)))?;

    let raw = if relative.is_empty() {
        format!("{}://{}{}", scheme, leader, REGISTRY_PREFIX)
    } else {
        format!("{}://{}{}/{}", scheme, leader, REGISTRY_PREFIX, relative)
    };

    let mut url = Url::parse(&raw).map_err(|e| DiscoveryError::InvalidUrl(e.to_string()))?;
    if !url.path().starts_with(REGISTRY_PREFIX) {
        return Err(DiscoveryError::InvalidUrl(format!(
            "path escapes registry: {}",
            path
        )));
    }
    url.set_query(query.filter(|q| !q.is_empty()));
    Ok(url)
}

pub fn copy_request_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    copy_headers_except(src, dst, &CLIENT_MANAGED_HEADERS);
}

pub fn copy_response_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    copy_headers_except(src, dst, &RELAY_SKIPPED_HEADERS);
}

fn copy_headers_except(src: &HeaderMap, dst: &mut HeaderMap, skipped: &[HeaderName]) {
    for (name, value) in src.iter() {
        if skipped.contains(name) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Only mutating requests chase a `307` to the new leader.
pub fn follows_redirect(method: &Method) -> bool {
    *method == Method::PUT || *method == Method::DELETE
}
