use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::identity::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    Notification,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub package_id: i64,
    pub sender_id: UserId,
    pub receiver_id: Option<UserId>,
    pub message: String,
    pub kind: MessageKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A message joined with the sender's display metadata for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender_username: Option<String>,
}
