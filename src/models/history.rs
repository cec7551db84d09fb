use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable point-in-time record of a package's location or status.
///
/// The status tag is a free annotation; it may duplicate or differ from the
/// package's current status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub id: i64,
    pub package_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewHistoryEvent {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}
