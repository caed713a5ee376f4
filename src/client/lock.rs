//! In-flight fetch registry: at most one leading fetch per key, followers wait for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

type Inflight = Arc<Mutex<HashMap<String, watch::Receiver<bool>>>>;

/// Shared by every clone of the owning client.
#[derive(Clone, Default)]
pub struct FetchRegistry {
    inflight: Inflight,
}

/// Outcome of [`FetchRegistry::acquire`].
pub enum Acquired {
    /// Caller runs the fetch; the key is released when the lease drops.
    Leader(FetchLease),
    /// Another fetch for this key is running.
    Follower(FetchWaiter),
}

impl FetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: &str) -> Acquired {
        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = inflight.get(key) {
            return Acquired::Follower(FetchWaiter { rx: rx.clone() });
        }
        let (done, rx) = watch::channel(false);
        inflight.insert(key.to_string(), rx);
        Acquired::Leader(FetchLease {
            key: key.to_string(),
            inflight: self.inflight.clone(),
            done,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held by the leading fetch. Dropping it, on any path, releases the key and wakes followers.
pub struct FetchLease {
    key: String,
    inflight: Inflight,
    done: watch::Sender<bool>,
}

impl FetchLease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for FetchLease {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        self.done.send_replace(true);
        tracing::debug!(target: "api_kit::client", key = %self.key, "fetch released");
    }
}

pub struct FetchWaiter {
    rx: watch::Receiver<bool>,
}

impl FetchWaiter {
    /// Wait for the leader to finish. `false` if it vanished without releasing.
    pub async fn wait(mut self) -> bool {
        self.rx.wait_for(|done| *done).await.is_ok()
    }
}
