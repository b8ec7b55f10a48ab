//! Subject enrollments: which teacher teaches a student which subject.
//!
//! Enrollments are never deleted. Unassigning deactivates the row, and
//! assigning the same student, subject and teacher again reactivates it.

pub mod service;

pub use service::EnrollmentService;
