//! Pure credential generation: username bases, unique suffixing and
//! one-time passwords. Nothing here touches the store.

use rand::Rng;
use rand::seq::SliceRandom;
use tutordesk_core::AppError;
use tutordesk_models::{Email, USERNAME_MAX_LEN};

/// Candidates tried per base before giving up: the base itself, then
/// `base1` through `base99`.
pub const MAX_USERNAME_ATTEMPTS: u32 = 100;

/// Room reserved at the end of a base for the numeric suffix.
const SUFFIX_WIDTH: usize = 2;

const LOWERCASE: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("no free username for base {base:?} after {attempts} attempts")]
    Exhausted { base: String, attempts: u32 },

    #[error("username base is empty")]
    EmptyBase,
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Exhausted { .. } => AppError::exhausted(err).with_field("username"),
            CredentialError::EmptyBase => AppError::internal(err),
        }
    }
}

/// Returns the first candidate from `base`, `base1`, `base2`, ... for which
/// `exists` is false.
pub fn generate_unique_username<F>(base: &str, mut exists: F) -> Result<String, CredentialError>
where
    F: FnMut(&str) -> bool,
{
    if base.is_empty() {
        return Err(CredentialError::EmptyBase);
    }

    for attempt in 0..MAX_USERNAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            base.to_string()
        } else {
            format!("{base}{attempt}")
        };
        if !exists(&candidate) {
            return Ok(candidate);
        }
    }

    Err(CredentialError::Exhausted {
        base: base.to_string(),
        attempts: MAX_USERNAME_ATTEMPTS,
    })
}

/// Lowercase ASCII slug: alphanumerics kept, every other run of characters
/// collapsed to a single `_`, no leading or trailing `_`.
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug.truncate(USERNAME_MAX_LEN - SUFFIX_WIDTH);
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

fn or_fallback(slug: String, fallback: &str) -> String {
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// `"Ivan", "Petrov"` becomes `ivan_petrov`.
pub fn username_base_from_name(first_name: &str, last_name: &str, fallback: &str) -> String {
    or_fallback(slugify(&format!("{first_name} {last_name}")), fallback)
}

/// `olga@example.com` becomes `olga`.
pub fn username_base_from_email(email: &Email, fallback: &str) -> String {
    or_fallback(slugify(email.local_part()), fallback)
}

/// Random password of `length` characters (at least three) drawn from an
/// alphabet without look-alike characters, containing at least one
/// lowercase letter, one uppercase letter and one digit.
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    let classes = [LOWERCASE, UPPERCASE, DIGITS];
    let length = length.max(classes.len());

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();

    let alphabet: Vec<u8> = classes.concat();
    while chars.len() < length {
        chars.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_free_base_is_used_as_is() {
        let username = generate_unique_username("ivan_petrov", |_| false).unwrap();
        assert_eq!(username, "ivan_petrov");
    }

    #[test]
    fn test_collisions_append_counter() {
        let taken: HashSet<&str> = ["olga", "olga1", "olga2"].into();
        let username = generate_unique_username("olga", |c| taken.contains(c)).unwrap();
        assert_eq!(username, "olga3");
    }

    #[test]
    fn test_sequential_requests_are_distinct() {
        let mut taken = HashSet::new();
        for _ in 0..MAX_USERNAME_ATTEMPTS {
            let username = generate_unique_username("student", |c| taken.contains(c)).unwrap();
            assert!(taken.insert(username));
        }
        assert_eq!(taken.len(), MAX_USERNAME_ATTEMPTS as usize);
    }

    #[test]
    fn test_exhaustion_is_bounded() {
        let mut calls = 0;
        let err = generate_unique_username("student", |_| {
            calls += 1;
            true
        })
        .unwrap_err();

        assert_eq!(calls, MAX_USERNAME_ATTEMPTS);
        assert_eq!(
            err,
            CredentialError::Exhausted {
                base: "student".into(),
                attempts: MAX_USERNAME_ATTEMPTS
            }
        );
    }

    #[test]
    fn test_exhaustion_is_a_client_error() {
        let err: AppError = CredentialError::Exhausted {
            base: "student".into(),
            attempts: MAX_USERNAME_ATTEMPTS,
        }
        .into();
        assert_eq!(err.kind, tutordesk_core::ErrorKind::IdentifierExhausted);
        assert_eq!(err.status.as_u16(), 400);
    }

    #[test]
    fn test_empty_base_rejected() {
        assert_eq!(
            generate_unique_username("", |_| false),
            Err(CredentialError::EmptyBase)
        );
    }

    #[test]
    fn test_name_base() {
        assert_eq!(
            username_base_from_name("Ivan", "Petrov", "student"),
            "ivan_petrov"
        );
        assert_eq!(
            username_base_from_name("  Anna-Maria ", "O'Neil", "student"),
            "anna_maria_o_neil"
        );
        assert_eq!(username_base_from_name("Иван", "", "student"), "student");
    }

    #[test]
    fn test_email_base() {
        let email = Email::new("olga@example.com").unwrap();
        assert_eq!(username_base_from_email(&email, "parent"), "olga");

        let email = Email::new("o.petrova+school@example.com").unwrap();
        assert_eq!(username_base_from_email(&email, "parent"), "o_petrova_school");
    }

    #[test]
    fn test_long_base_leaves_room_for_suffix() {
        let first = "a".repeat(200);
        let base = username_base_from_name(&first, "", "student");
        assert_eq!(base.len(), USERNAME_MAX_LEN - SUFFIX_WIDTH);

        let suffixed = format!("{base}{}", MAX_USERNAME_ATTEMPTS - 1);
        assert!(tutordesk_models::Username::new(suffixed).is_ok());
    }

    #[test]
    fn test_password_shape() {
        for _ in 0..50 {
            let password = generate_password(12);
            assert_eq!(password.len(), 12);
            assert!(password.bytes().any(|b| LOWERCASE.contains(&b)));
            assert!(password.bytes().any(|b| UPPERCASE.contains(&b)));
            assert!(password.bytes().any(|b| DIGITS.contains(&b)));
            assert!(!password.contains(|c: char| "0O1lI".contains(c)));
        }
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(16), generate_password(16));
    }
}
