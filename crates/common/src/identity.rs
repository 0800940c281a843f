//! Cart/order partition key.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable identifier of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ephemeral guest-session token.
///
/// Client supplied and unauthenticated: it partitions carts and orders but
/// proves nothing about who holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Creates a session token from a non-blank string.
    ///
    /// Surrounding whitespace is trimmed. Returns `None` for a blank token.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The principal a cart or order is partitioned by.
///
/// Exactly one of a user id or a guest session token. The core never inspects
/// it beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identity {
    /// Authenticated user.
    User(UserId),
    /// Anonymous guest session.
    Guest(SessionToken),
}

impl Identity {
    /// Returns the storage discriminator (`"user"` or `"guest"`).
    pub fn kind(&self) -> &'static str {
        match self {
            Identity::User(_) => "user",
            Identity::Guest(_) => "guest",
        }
    }

    /// Returns the raw partition key value.
    pub fn key(&self) -> String {
        match self {
            Identity::User(id) => id.to_string(),
            Identity::Guest(token) => token.as_str().to_string(),
        }
    }
}

impl From<UserId> for Identity {
    fn from(id: UserId) -> Self {
        Identity::User(id)
    }
}

impl From<SessionToken> for Identity {
    fn from(token: SessionToken) -> Self {
        Identity::Guest(token)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.key())
    }
}
