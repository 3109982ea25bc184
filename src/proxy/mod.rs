//! Leader-Following Proxy Module
//!
//! Forwards member traffic for a discovery token into the backing etcd cluster's
//! registry namespace (`v2/keys/_etcd/registry/...`).
//!
//! ## Core Mechanisms
//! - **Leader Cache**: The last known writable etcd member (`host:port`), shared by
//!   every request and injected into the proxy rather than held globally.
//! - **Redirect Following**: Non-leader members answer mutating requests with
//!   `307 Temporary Redirect`. For PUT and DELETE the proxy records the redirect
//!   target as the new leader and retries, up to a bounded number of attempts.
//!   GET redirects are relayed to the caller untouched.

pub mod handlers;
pub mod leader;
pub mod protocol;
pub mod service;
