//! Accounts: self-registration, activation, deletion and the combined
//! user-plus-profile view.

pub mod service;

pub use service::{UserService, load_account};
