use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::models::history::{HistoryEvent, NewHistoryEvent};

/// Append-only log of location and status events per package.
pub struct HistoryLog {
    events: DashMap<i64, Vec<HistoryEvent>>,
    next_id: AtomicI64,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Unconditional insert; the caller has already resolved the package.
    pub fn append(&self, package_id: i64, new: NewHistoryEvent) -> HistoryEvent {
        let event = HistoryEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            package_id,
            latitude: new.latitude,
            longitude: new.longitude,
            location_name: new.location_name,
            description: new.description,
            status: new.status,
            created_at: Utc::now(),
        };

        self.events
            .entry(package_id)
            .or_default()
            .push(event.clone());
        event
    }

    /// Newest first.
    pub fn list_by_package(&self, package_id: i64) -> Vec<HistoryEvent> {
        self.events
            .get(&package_id)
            .map(|entry| entry.value().iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}
