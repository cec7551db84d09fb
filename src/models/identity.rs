use serde::{Deserialize, Serialize};

pub type UserId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Courier,
    Admin,
}

/// A resolved session identity. Read-only from this core's perspective;
/// account management lives in the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub role: Role,
}
