//! Token Registry Module
//!
//! Owns the lifecycle of discovery tokens in the backing store.
//!
//! ## Core Concepts
//! - **Token**: 128 random bits, hex encoded. Doubles as a URL segment handed back
//!   to clients and as the key prefix `_etcd/registry/<token>` in etcd.
//! - **Create**: Writes `_etcd/registry/<token>/_config/size`; a token is only
//!   returned once that write has been accepted.
//! - **Delete**: Removes the whole `_etcd/registry/<token>` subtree.
//! - **Health**: A create immediately followed by a delete, proving etcd is
//!   reachable and writable end to end.
//!
//! All writes travel through the leader-following proxy, so they share its
//! leader cache and redirect handling.

pub mod handlers;
pub mod service;
pub mod types;
