use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::identity::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Pending,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl PackageStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "picked_up" => Some(Self::PickedUp),
            "in_transit" => Some(Self::InTransit),
            "out_for_delivery" => Some(Self::OutForDelivery),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PickedUp => "picked_up",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: i64,
    pub tracking_number: String,
    pub sender_id: UserId,
    pub receiver_name: String,
    pub receiver_phone: Option<String>,
    pub receiver_address: String,
    pub description: Option<String>,
    pub weight: Option<f64>,
    pub status: PackageStatus,
    pub courier_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::PackageStatus;

    #[test]
    fn parse_accepts_every_known_status() {
        for raw in [
            "pending",
            "picked_up",
            "in_transit",
            "out_for_delivery",
            "delivered",
            "cancelled",
        ] {
            let status = PackageStatus::parse(raw).unwrap();
            assert_eq!(status.as_str(), raw);
        }
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert!(PackageStatus::parse("not_a_status").is_none());
        assert!(PackageStatus::parse("").is_none());
        assert!(PackageStatus::parse("Pending").is_none());
    }
}
