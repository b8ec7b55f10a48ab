//! Validated string newtypes: [`Email`] and [`Username`].
//!
//! Both are stored as `TEXT` and can only be constructed through their
//! validating constructors (or `new_unchecked` when loading trusted rows).

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{
    Database, Decode, Encode, Type,
    postgres::{PgHasArrayType, PgTypeInfo},
};
use std::fmt;
use std::str::FromStr;
use validator::ValidateEmail;

/// Maximum username length, matching the `users.username` column.
pub const USERNAME_MAX_LEN: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueTypeError {
    InvalidEmail(String),
    InvalidUsername(String),
}

impl std::error::Error for ValueTypeError {}

impl fmt::Display for ValueTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            Self::InvalidUsername(msg) => write!(f, "Invalid username: {}", msg),
        }
    }
}

/// Implements display, conversions and Postgres `TEXT` mapping for a
/// validated string newtype.
macro_rules! text_value_type {
    ($name:ident) => {
        impl $name {
            /// Wrap a value loaded from a trusted source without validating it.
            #[inline]
            pub fn new_unchecked(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[inline]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValueTypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueTypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = String::deserialize(deserializer)?;
                Self::new(value).map_err(serde::de::Error::custom)
            }
        }

        impl Type<sqlx::Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Postgres as Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: <sqlx::Postgres as Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                <String as Decode<'r, sqlx::Postgres>>::decode(value).map(Self)
            }
        }

        impl PgHasArrayType for $name {
            fn array_type_info() -> PgTypeInfo {
                <String as PgHasArrayType>::array_type_info()
            }
        }
    };
}

// ============================================================================
// Email
// ============================================================================

/// A validated email address.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(email: impl Into<String>) -> Result<Self, ValueTypeError> {
        let email = email.into().trim().to_string();

        if email.is_empty() {
            return Err(ValueTypeError::InvalidEmail("email cannot be empty".into()));
        }
        if !email.validate_email() {
            return Err(ValueTypeError::InvalidEmail(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        Ok(Self(email))
    }

    /// The part before `@`.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or("")
    }

    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }
}

text_value_type!(Email);

// ============================================================================
// Username
// ============================================================================

/// A login name: 1..=150 characters of lowercase ASCII letters, digits and
/// `_ . - @ +`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(username: impl Into<String>) -> Result<Self, ValueTypeError> {
        let username = username.into();

        if username.is_empty() {
            return Err(ValueTypeError::InvalidUsername(
                "username cannot be empty".into(),
            ));
        }
        if username.len() > USERNAME_MAX_LEN {
            return Err(ValueTypeError::InvalidUsername(format!(
                "username is longer than {} characters",
                USERNAME_MAX_LEN
            )));
        }
        if let Some(c) = username.chars().find(|c| !is_username_char(*c)) {
            return Err(ValueTypeError::InvalidUsername(format!(
                "'{}' is not allowed in a username",
                c
            )));
        }

        Ok(Self(username))
    }
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-' | '@' | '+')
}

text_value_type!(Username);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_parts() {
        let email = Email::new("olga@example.com").unwrap();
        assert_eq!(email.local_part(), "olga");
        assert_eq!(email.domain(), "example.com");
    }

    #[test]
    fn test_email_is_trimmed() {
        let email = Email::new("  olga@example.com ").unwrap();
        assert_eq!(email.as_str(), "olga@example.com");
    }

    #[test]
    fn test_invalid_emails() {
        assert!(Email::new("").is_err());
        assert!(Email::new("olga").is_err());
        assert!(Email::new("olga@").is_err());
    }

    #[test]
    fn test_username_rules() {
        assert!(Username::new("ivan_petrov").is_ok());
        assert!(Username::new("ivan_petrov12").is_ok());
        assert!(Username::new("").is_err());
        assert!(Username::new("Ivan").is_err());
        assert!(Username::new("иван").is_err());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<Username, _> = serde_json::from_str(r#""olga""#);
        assert!(ok.is_ok());

        let bad: Result<Email, _> = serde_json::from_str(r#""not-an-email""#);
        assert!(bad.is_err());
    }
}
