pub mod access;
pub mod credentials;
pub mod enrollments;
pub mod students;
pub mod subjects;
pub mod users;
pub mod validation;

pub use self::credentials::CredentialService;
pub use self::enrollments::EnrollmentService;
pub use self::students::StudentService;
pub use self::subjects::SubjectService;
pub use self::users::UserService;
