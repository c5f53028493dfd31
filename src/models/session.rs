use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::User;

/// Opaque session identifier. Never leaves the server unencrypted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a persisted user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// The session identifier.
    pub id: SessionId,
    /// The principal this session belongs to.
    pub user: User,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

impl Entry {
    /// Whether the entry is still valid now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use chrono::Duration;

    #[test]
    fn entries_are_valid_strictly_before_expiry() {
        let expires_at = Utc::now();
        let entry = Entry {
            id: SessionId::new("abc"),
            user: User {
                id: 1,
                name: "ana".into(),
                roles: vec![Role::User],
                avatar: String::new(),
            },
            expires_at,
        };

        assert!(entry.is_valid_at(expires_at - Duration::seconds(1)));
        assert!(!entry.is_valid_at(expires_at));
        assert!(!entry.is_valid_at(expires_at + Duration::seconds(1)));
    }
}
