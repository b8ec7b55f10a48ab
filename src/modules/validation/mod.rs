//! Consistency rules applied before every write.
//!
//! - Input DTOs are checked with `validator`
//! - Student profile links: the tutor must be an active tutor and the parent
//!   an active parent; every write of a profile goes through
//!   [`save_student_profile`]
//!
//! Both stores re-check the link rules on write and refuse to delete rows
//! that active enrollments or lessons depend on.

pub mod service;

pub use service::{check_link, save_student_profile, validate_dto, validate_student_profile};
