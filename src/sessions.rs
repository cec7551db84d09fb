use dashmap::DashMap;

use crate::models::identity::{Identity, UserId};

/// Stand-in for the external identity provider: maps opaque session tokens to
/// resolved identities. Populated out of band; this core only reads it.
pub struct SessionProvider {
    users: DashMap<UserId, Identity>,
    sessions: DashMap<String, UserId>,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn register(&self, identity: Identity, session_token: impl Into<String>) {
        self.sessions.insert(session_token.into(), identity.id);
        self.users.insert(identity.id, identity);
    }

    pub fn resolve(&self, session_token: &str) -> Option<Identity> {
        let user_id = *self.sessions.get(session_token)?;
        self.user(user_id)
    }

    pub fn user(&self, id: UserId) -> Option<Identity> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionProvider;
    use crate::models::identity::{Identity, Role};

    #[test]
    fn resolves_registered_sessions_only() {
        let provider = SessionProvider::new();
        provider.register(
            Identity {
                id: 1,
                username: "ana".to_string(),
                display_name: "Ana".to_string(),
                role: Role::User,
            },
            "token-1",
        );

        assert_eq!(provider.resolve("token-1").unwrap().id, 1);
        assert!(provider.resolve("token-2").is_none());
        assert!(provider.user(2).is_none());
    }
}
