//! Students managed by tutors: creating a student together with a parent
//! account, and maintaining the tutor and parent links.

pub mod service;

pub use service::{MAX_CREATE_ATTEMPTS, StudentService};
