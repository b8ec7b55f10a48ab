//! # Tutordesk Core
//!
//! Core types, errors, and utilities shared by every Tutordesk crate.
//!
//! - [`errors`]: Application error type, error taxonomy and HTTP response conversion
//! - [`password`]: bcrypt password hashing and verification
//!
//! # Example
//!
//! ```ignore
//! use tutordesk_core::errors::{AppError, ErrorKind};
//! use tutordesk_core::password::hash_password;
//!
//! let error = AppError::not_found(anyhow::anyhow!("Student not found"));
//! assert_eq!(error.kind, ErrorKind::NotFound);
//!
//! let hash = hash_password("secure_password")?;
//! ```

pub mod errors;
pub mod password;

pub use errors::{AppError, ErrorKind, Locale};
pub use password::{hash_password, hash_password_with_cost, verify_password};
