//! DTOs for tutor-managed student and parent accounts.

use crate::credentials::GeneratedCredentials;
use crate::profiles::Account;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Attributes of the student a tutor is enrolling.
#[derive(Deserialize, Debug, Clone, Validate)]
pub struct NewStudentDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    #[serde(default)]
    pub grade: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub goal: String,
}

/// Attributes of the student's parent. The email is mandatory since it is
/// how the parent is reached.
#[derive(Deserialize, Debug, Clone, Validate)]
pub struct NewParentDto {
    #[validate(length(max = 100))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct CreateStudentWithParentDto {
    #[validate(nested)]
    pub student: NewStudentDto,
    #[validate(nested)]
    pub parent: NewParentDto,
}

/// Result of creating a student together with their parent.
///
/// The credentials are the only plaintext copy handed back synchronously.
#[derive(Serialize, Debug, Clone)]
pub struct CreatedFamily {
    pub student: Account,
    pub parent: Account,
    pub student_credentials: GeneratedCredentials,
    pub parent_credentials: GeneratedCredentials,
}

/// Credentials still waiting to be handed over for one student.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ClaimedCredentials {
    pub student: Option<GeneratedCredentials>,
    pub parent: Option<GeneratedCredentials>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto() -> CreateStudentWithParentDto {
        CreateStudentWithParentDto {
            student: NewStudentDto {
                first_name: "Ivan".into(),
                last_name: "Petrov".into(),
                email: None,
                grade: "9".into(),
                goal: "Pass the OGE in maths".into(),
            },
            parent: NewParentDto {
                first_name: "Olga".into(),
                last_name: "Petrova".into(),
                email: "olga@example.com".into(),
            },
        }
    }

    #[test]
    fn test_valid_family() {
        assert!(dto().validate().is_ok());
    }

    #[test]
    fn test_nested_parent_email_is_validated() {
        let mut invalid = dto();
        invalid.parent.email = "olga-at-example".into();
        let errors = invalid.validate().unwrap_err();
        assert!(errors.errors().contains_key("parent"));
    }

    #[test]
    fn test_student_name_required() {
        let mut invalid = dto();
        invalid.student.first_name.clear();
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_parent_deserializes_without_names() {
        let json = r#"{
            "student": {"first_name": "Ivan", "last_name": "Petrov"},
            "parent": {"email": "olga@example.com"}
        }"#;
        let parsed: CreateStudentWithParentDto = serde_json::from_str(json).unwrap();
        assert!(parsed.parent.first_name.is_empty());
        assert!(parsed.validate().is_ok());
    }
}
