//! Room Broker: the in-memory registry of live subscriptions, keyed by
//! tracking token. Confined to this process; a multi-instance deployment would
//! need an external pub/sub layer in front of it.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::events::ServerEvent;

pub type ConnectionId = Uuid;
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

pub struct RoomBroker {
    rooms: DashMap<String, HashMap<ConnectionId, EventSender>>,
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl RoomBroker {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Idempotent: joining a room twice leaves a single membership.
    pub fn join(&self, conn_id: ConnectionId, outbound: EventSender, tracking: &str) {
        self.rooms
            .entry(tracking.to_string())
            .or_default()
            .insert(conn_id, outbound);
        self.memberships
            .entry(conn_id)
            .or_default()
            .insert(tracking.to_string());

        debug!(connection = %conn_id, room = %tracking, "joined room");
    }

    pub fn leave(&self, conn_id: ConnectionId, tracking: &str) {
        if let Some(members) = self.memberships.get(&conn_id) {
            if !members.contains(tracking) {
                return;
            }
        }

        self.remove_member(conn_id, tracking);
        if let Some(mut members) = self.memberships.get_mut(&conn_id) {
            members.remove(tracking);
        }

        debug!(connection = %conn_id, room = %tracking, "left room");
    }

    /// Invoked exactly once per disconnect by the gateway; the broker cannot
    /// observe disconnects itself.
    pub fn leave_all(&self, conn_id: ConnectionId) {
        if let Some((_, rooms)) = self.memberships.remove(&conn_id) {
            for tracking in rooms {
                self.remove_member(conn_id, &tracking);
            }
        }

        debug!(connection = %conn_id, "left all rooms");
    }

    /// Best-effort fan-out to every current member of the room. Members whose
    /// outbound queue is gone are skipped, not retried. Per-room delivery
    /// order equals invocation order.
    pub fn broadcast(&self, tracking: &str, event: &ServerEvent) -> usize {
        let Some(room) = self.rooms.get(tracking) else {
            return 0;
        };

        room.values()
            .filter(|outbound| outbound.send(event.clone()).is_ok())
            .count()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, tracking: &str) -> usize {
        self.rooms
            .get(tracking)
            .map(|room| room.len())
            .unwrap_or(0)
    }

    fn remove_member(&self, conn_id: ConnectionId, tracking: &str) {
        if let Some(mut room) = self.rooms.get_mut(tracking) {
            room.remove(&conn_id);
        }

        // The emptiness check must happen under the entry lock: a drop-then-
        // remove would race a concurrent join and delete the room out from
        // under the fresh member.
        self.rooms.remove_if(tracking, |_, members| members.is_empty());
    }
}

impl Default for RoomBroker {
    fn default() -> Self {
        Self::new()
    }
}
