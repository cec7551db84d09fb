//! Wire protocol for the real-time channel. Events travel as JSON envelopes of
//! the form `{"event": "...", "data": ...}` in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::identity::UserId;
use crate::models::package::PackageStatus;

#[derive(Debug, Clone, Deserialize)]
pub struct LocationUpdate {
    pub tracking: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageSend {
    pub tracking: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "track:join")]
    TrackJoin(String),
    #[serde(rename = "track:leave")]
    TrackLeave(String),
    #[serde(rename = "location:update")]
    LocationUpdate(LocationUpdate),
    #[serde(rename = "message:send")]
    MessageSend(MessageSend),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "status:updated")]
    StatusUpdated {
        tracking: String,
        status: PackageStatus,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "location:updated")]
    LocationUpdated {
        tracking: String,
        latitude: Option<f64>,
        longitude: Option<f64>,
        location_name: Option<String>,
        description: Option<String>,
        status: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "message:received")]
    MessageReceived {
        id: i64,
        tracking: String,
        sender_id: UserId,
        message: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::{ClientEvent, ServerEvent};
    use crate::models::package::PackageStatus;

    #[test]
    fn client_events_deserialize_from_envelopes() {
        let join: ClientEvent =
            serde_json::from_value(json!({ "event": "track:join", "data": "PKG0000000001" }))
                .unwrap();
        assert!(matches!(join, ClientEvent::TrackJoin(t) if t == "PKG0000000001"));

        let send: ClientEvent = serde_json::from_value(json!({
            "event": "message:send",
            "data": { "tracking": "PKG0000000001", "message": "hola" }
        }))
        .unwrap();
        assert!(matches!(send, ClientEvent::MessageSend(m) if m.message == "hola"));

        assert!(
            serde_json::from_value::<ClientEvent>(json!({ "event": "bogus", "data": 1 })).is_err()
        );
    }

    #[test]
    fn server_events_carry_their_event_name() {
        let event = ServerEvent::StatusUpdated {
            tracking: "PKG0000000001".to_string(),
            status: PackageStatus::InTransit,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "status:updated");
        assert_eq!(value["data"]["status"], "in_transit");
    }
}
