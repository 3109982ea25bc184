use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{DiscoveryError, Result};

/// Number of random bytes behind a token.
pub const TOKEN_BYTES: usize = 16;
/// Hex length of a token.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-f0-9]{32}$").expect("token pattern is a valid regex")
});

/// A discovery token: exactly 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Draws 128 bits from the OS random source.
    ///
    /// A failing random source is reported as an error rather than an empty token.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self(hex::encode(bytes)))
    }

    pub fn parse(candidate: &str) -> Option<Self> {
        if TOKEN_PATTERN.is_match(candidate) {
            Some(Self(candidate.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Cluster size used when `/new` is called without one.
pub const DEFAULT_CLUSTER_SIZE: u32 = 3;

/// Parses the `size` query parameter. Absent or empty means the default.
pub fn parse_size(raw: Option<&str>) -> Result<u32> {
    match raw {
        None | Some("") => Ok(DEFAULT_CLUSTER_SIZE),
        Some(s) => s
            .parse::<u32>()
            .map_err(|_| DiscoveryError::InvalidSize(s.to_string())),
    }
}

// --- etcd v2 keys API responses ---

/// Body of a successful keys API read, e.g.
/// `{"action":"get","node":{"key":"/_etcd/registry/<token>/_config/size","value":"3"}}`.
///
/// Only the node value is read; other fields are ignored.
#[derive(Debug, Deserialize)]
pub struct KeysResponse {
    pub node: KeyNode,
}

#[derive(Debug, Deserialize)]
pub struct KeyNode {
    #[serde(default)]
    pub value: Option<String>,
}
