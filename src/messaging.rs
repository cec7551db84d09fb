use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::models::identity::UserId;
use crate::models::message::{Message, MessageKind};

/// Append-only per-package chat/notification log.
pub struct MessagingStore {
    messages: DashMap<i64, Vec<Message>>,
    next_id: AtomicI64,
}

impl MessagingStore {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn append(
        &self,
        package_id: i64,
        sender_id: UserId,
        receiver_id: Option<UserId>,
        body: impl Into<String>,
        kind: MessageKind,
    ) -> Message {
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            package_id,
            sender_id,
            receiver_id,
            message: body.into(),
            kind,
            is_read: false,
            created_at: Utc::now(),
        };

        self.messages
            .entry(package_id)
            .or_default()
            .push(message.clone());
        message
    }

    /// Oldest first; chat is conversational, unlike the newest-first history.
    pub fn list_by_package(&self, package_id: i64) -> Vec<Message> {
        self.messages
            .get(&package_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl Default for MessagingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::MessagingStore;
    use crate::models::message::MessageKind;

    #[test]
    fn list_is_oldest_first() {
        let store = MessagingStore::new();
        let first = store.append(3, 1, Some(5), "on my way", MessageKind::Chat);
        let second = store.append(3, 5, Some(1), "thanks", MessageKind::Chat);

        let listed = store.list_by_package(3);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[test]
    fn broadcast_messages_may_have_no_receiver() {
        let store = MessagingStore::new();
        let message = store.append(3, 1, None, "package delayed", MessageKind::System);

        assert!(message.receiver_id.is_none());
        assert!(!message.is_read);
    }
}
