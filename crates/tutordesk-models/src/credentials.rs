//! Credentials issued on behalf of users who did not register themselves.

use crate::ids::UserId;
use crate::value_types::Username;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;

/// A one-time username/password pair, shown to the creating tutor once.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedCredentials {
    pub username: Username,
    pub password: String,
}

impl fmt::Debug for GeneratedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCredentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Pending handoff of generated credentials to the tutor who issued them.
///
/// Single use: claiming deletes the row. Rows past `expires_at` are never
/// returned.
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct CredentialHandoff {
    pub user_id: UserId,
    pub username: Username,
    pub password: String,
    pub issued_to: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CredentialHandoff {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn into_credentials(self) -> GeneratedCredentials {
        GeneratedCredentials {
            username: self.username,
            password: self.password,
        }
    }
}

impl fmt::Debug for CredentialHandoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandoff")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("issued_to", &self.issued_to)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
