//! Cluster Discovery Service Library
//!
//! Hands out discovery tokens for bootstrapping etcd clusters and relays member
//! registration traffic to a backing etcd cluster. The binary (`main.rs`) only
//! parses configuration and wires these modules together.
//!
//! ## Modules
//! - **`registry`**: Token generation and the create/delete/health lifecycle of
//!   `_etcd/registry/<token>` in the backing store.
//! - **`proxy`**: The leader-following proxy. Rewrites token paths into etcd's keys
//!   namespace and chases `307` redirects to the current leader, caching it.
//! - **`server`**: The axum router tying the HTTP routes to both of the above.
//! - **`config`**: Command line and environment configuration, validated up front.
//! - **`metrics`**: Per-endpoint request counters with an optional Prometheus exporter.
//! - **`error`**: The shared error type.

pub mod config;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod registry;
pub mod server;

#[cfg(test)]
mod test_support;
