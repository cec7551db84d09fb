use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::history::HistoryLog;
use crate::messaging::MessagingStore;
use crate::observability::metrics::Metrics;
use crate::registry::PackageRegistry;
use crate::rooms::RoomBroker;
use crate::sessions::SessionProvider;

pub struct AppState {
    pub registry: PackageRegistry,
    pub history: HistoryLog,
    pub messages: MessagingStore,
    pub sessions: SessionProvider,
    pub rooms: RoomBroker,
    pub locks: PackageLocks,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            registry: PackageRegistry::new(),
            history: HistoryLog::new(),
            messages: MessagingStore::new(),
            sessions: SessionProvider::new(),
            rooms: RoomBroker::new(),
            locks: PackageLocks::new(),
            metrics: Metrics::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-package write serialization, keyed by tracking token. Every
/// append-then-broadcast sequence runs under the package's lock so room
/// observers never see a broadcast for an event that is not yet recorded, and
/// never see same-package broadcasts reordered. Unrelated packages proceed
/// independently.
///
/// Entries are never pruned: one `Arc<Mutex<()>>` stays resident per token
/// ever written. That is bounded by the package stores themselves while they
/// are in-process; a deployment with an external store should add eviction
/// here alongside it.
pub struct PackageLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PackageLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    pub async fn acquire(&self, tracking: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(tracking.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }
}

impl Default for PackageLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::PackageLocks;

    #[tokio::test]
    async fn different_packages_do_not_contend() {
        let locks = PackageLocks::new();

        let _a = locks.acquire("PKG-A").await;
        // Would deadlock if locks were global rather than per-token.
        let _b = locks.acquire("PKG-B").await;
    }

    #[tokio::test]
    async fn same_package_serializes() {
        let locks = std::sync::Arc::new(PackageLocks::new());

        let guard = locks.acquire("PKG-A").await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("PKG-A").await;
            })
        };

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }
}
