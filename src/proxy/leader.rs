use reqwest::Url;
use tokio::sync::RwLock;

/// Last known leader of the backing store.
///
/// Writes are last-write-wins overwrites of an advisory value. A stale read costs
/// one extra redirect round trip, never a wrong answer.
#[derive(Debug)]
pub struct LeaderCache {
    current: RwLock<String>,
}

impl LeaderCache {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(initial.into()),
        }
    }

    /// Snapshot of the current leader. The lock is released before returning.
    pub async fn get(&self) -> String {
        self.current.read().await.clone()
    }

    pub async fn set(&self, leader: impl Into<String>) {
        let leader = leader.into();
        let mut current = self.current.write().await;
        if *current != leader {
            tracing::info!("etcd leader changed: {} -> {}", *current, leader);
            *current = leader;
        }
    }
}

/// `host[:port]` of a URL, the form stored in the leader cache.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
