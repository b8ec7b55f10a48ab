//! # Tutordesk Models
//!
//! Domain entities and DTOs shared by the store and the services.
//!
//! # Modules
//!
//! - [`credentials`]: Generated credentials and their one-time handoff records
//! - [`enrollments`]: Student/subject/teacher enrollments
//! - [`ids`]: Strongly-typed entity IDs
//! - [`profiles`]: Role profiles and the `Account` view
//! - [`students`]: DTOs for tutor-created students and parents
//! - [`subjects`]: Subjects and lessons
//! - [`users`]: Users and roles
//! - [`value_types`]: Validated `Email` and `Username`
//!
//! # Example
//!
//! ```ignore
//! use tutordesk_models::{Account, Profile, Role};
//!
//! fn tutor_of(account: &Account) -> Option<UserId> {
//!     match &account.profile {
//!         Profile::Student(profile) => profile.tutor_id,
//!         _ => None,
//!     }
//! }
//! ```

pub mod credentials;
pub mod enrollments;
pub mod ids;
pub mod profiles;
pub mod students;
pub mod subjects;
pub mod users;
pub mod value_types;

pub use credentials::{CredentialHandoff, GeneratedCredentials};
pub use enrollments::{EnrollmentStatus, SubjectEnrollment};
pub use ids::{EnrollmentId, LessonId, SubjectId, UserId};
pub use profiles::{
    Account, ParentProfile, Profile, StudentProfile, TeacherProfile, TutorProfile,
};
pub use students::{
    ClaimedCredentials, CreateStudentWithParentDto, CreatedFamily, NewParentDto, NewStudentDto,
};
pub use subjects::{CreateSubjectDto, Lesson, ScheduleLessonDto, Subject};
pub use users::{RegisterUserDto, Role, User};
pub use value_types::{Email, USERNAME_MAX_LEN, Username, ValueTypeError};
