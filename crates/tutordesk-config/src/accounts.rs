//! Account creation settings.
//!
//! # Environment Variables
//!
//! - `PASSWORD_HASH_COST`: bcrypt cost for stored password hashes (default: 12, clamped to 4..=31)
//! - `GENERATED_PASSWORD_LENGTH`: length of generated one-time passwords (default: 12, minimum 8)
//! - `CREDENTIAL_HANDOFF_TTL_HOURS`: how long a tutor may retrieve generated credentials (default: 72)

use crate::env_or;

const DEFAULT_HASH_COST: u32 = 12;
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;
const DEFAULT_PASSWORD_LENGTH: usize = 12;
const MIN_PASSWORD_LENGTH: usize = 8;
const DEFAULT_HANDOFF_TTL_HOURS: i64 = 72;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountsConfig {
    pub password_hash_cost: u32,
    pub generated_password_length: usize,
    pub handoff_ttl_hours: i64,
}

impl AccountsConfig {
    pub fn from_env() -> Self {
        Self {
            password_hash_cost: env_or("PASSWORD_HASH_COST", DEFAULT_HASH_COST),
            generated_password_length: env_or(
                "GENERATED_PASSWORD_LENGTH",
                DEFAULT_PASSWORD_LENGTH,
            ),
            handoff_ttl_hours: env_or("CREDENTIAL_HANDOFF_TTL_HOURS", DEFAULT_HANDOFF_TTL_HOURS),
        }
        .normalized()
    }

    /// Clamp values into the ranges the rest of the system relies on.
    pub fn normalized(mut self) -> Self {
        self.password_hash_cost = self.password_hash_cost.clamp(MIN_HASH_COST, MAX_HASH_COST);
        self.generated_password_length = self.generated_password_length.max(MIN_PASSWORD_LENGTH);
        self.handoff_ttl_hours = self.handoff_ttl_hours.max(1);
        self
    }

    /// Cheapest hashing settings, for tests.
    pub fn fast() -> Self {
        Self {
            password_hash_cost: MIN_HASH_COST,
            ..Self::default()
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            password_hash_cost: DEFAULT_HASH_COST,
            generated_password_length: DEFAULT_PASSWORD_LENGTH,
            handoff_ttl_hours: DEFAULT_HANDOFF_TTL_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AccountsConfig::default();
        assert_eq!(config.password_hash_cost, 12);
        assert_eq!(config.generated_password_length, 12);
        assert_eq!(config.handoff_ttl_hours, 72);
    }

    #[test]
    fn test_normalized_clamps() {
        let config = AccountsConfig {
            password_hash_cost: 2,
            generated_password_length: 3,
            handoff_ttl_hours: 0,
        }
        .normalized();
        assert_eq!(config.password_hash_cost, 4);
        assert_eq!(config.generated_password_length, 8);
        assert_eq!(config.handoff_ttl_hours, 1);
    }
}
