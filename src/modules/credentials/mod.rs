//! Credentials for accounts created on someone else's behalf.
//!
//! [`generator`] holds the pure parts (username bases, bounded unique
//! suffixing, passwords); [`service`] binds them to the store and handles the
//! one-time handoff of generated passwords to the issuing tutor.

pub mod generator;
pub mod service;

pub use generator::{
    CredentialError, MAX_USERNAME_ATTEMPTS, generate_password, generate_unique_username,
    username_base_from_email, username_base_from_name,
};
pub use service::{AllocatedCredentials, CredentialService};
