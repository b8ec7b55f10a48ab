use anyhow::anyhow;
use tracing::{instrument, warn};
use tutordesk_core::AppError;
use tutordesk_db::StoreTx;
use tutordesk_models::{Role, StudentProfile, User};
use tutordesk_observability::track_validation_failure;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Dotted path of the first invalid field, in name order, e.g. `parent.email`.
fn first_invalid_field(errors: &ValidationErrors) -> Option<String> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    let (field, kind) = fields.into_iter().next()?;

    let nested = match kind {
        ValidationErrorsKind::Struct(inner) => first_invalid_field(inner),
        ValidationErrorsKind::List(items) => items
            .values()
            .next()
            .and_then(|inner| first_invalid_field(inner)),
        ValidationErrorsKind::Field(_) => None,
    };

    Some(match nested {
        Some(path) => format!("{field}.{path}"),
        None => field.to_string(),
    })
}

/// Runs the DTO's `validator` rules.
pub fn validate_dto<T: Validate>(dto: &T) -> Result<(), AppError> {
    dto.validate().map_err(|errors| {
        let field = first_invalid_field(&errors).unwrap_or_else(|| "input".to_string());
        track_validation_failure("input");
        AppError::invalid_field(field, errors)
    })
}

/// Checks one student profile link: `linked` must exist, hold `role` and be
/// active. `field` names the link in the error.
pub fn check_link(field: &'static str, linked: Option<&User>, role: Role) -> Result<(), AppError> {
    let (rule, cause) = match linked {
        None => ("missing", anyhow!("{field} does not exist")),
        Some(user) if user.role != role => (
            "role",
            anyhow!("{field} {} has role {}, expected {role}", user.id, user.role),
        ),
        Some(user) if !user.is_active => ("inactive", anyhow!("{field} {} is inactive", user.id)),
        Some(_) => return Ok(()),
    };

    track_validation_failure(match (field, rule) {
        ("tutor", "role") => "tutor_role",
        ("tutor", "inactive") => "tutor_active",
        ("parent", "role") => "parent_role",
        ("parent", "inactive") => "parent_active",
        _ => "link_missing",
    });
    warn!(field, rule, "Student profile link rejected");
    Err(AppError::invalid_field(field, cause))
}

/// Applies the tutor and parent link rules to `profile`.
#[instrument(skip_all, fields(student_id = %profile.user_id))]
pub async fn validate_student_profile(
    tx: &mut dyn StoreTx,
    profile: &StudentProfile,
) -> Result<(), AppError> {
    let links = [
        ("tutor", profile.tutor_id, Role::Tutor),
        ("parent", profile.parent_id, Role::Parent),
    ];

    for (field, id, role) in links {
        let Some(id) = id else { continue };
        let linked = tx.find_user(id).await?;
        check_link(field, linked.as_ref(), role)?;
    }

    Ok(())
}

/// The only write path for student profiles: validates, then inserts when
/// `is_new` and updates otherwise.
pub async fn save_student_profile(
    tx: &mut dyn StoreTx,
    profile: &StudentProfile,
    is_new: bool,
) -> Result<(), AppError> {
    validate_student_profile(tx, profile).await?;

    if is_new {
        tx.insert_student_profile(profile).await?;
    } else {
        tx.update_student_profile(profile).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tutordesk_core::ErrorKind;
    use tutordesk_models::{CreateStudentWithParentDto, NewParentDto, NewStudentDto, UserId, Username};

    fn user(role: Role, active: bool) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            username: Username::new("linked").unwrap(),
            email: None,
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            role,
            is_active: active,
            is_verified: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_links_pass() {
        assert!(check_link("tutor", Some(&user(Role::Tutor, true)), Role::Tutor).is_ok());
        assert!(check_link("parent", Some(&user(Role::Parent, true)), Role::Parent).is_ok());
    }

    #[test]
    fn test_every_other_role_fails_with_field() {
        for role in Role::ALL.into_iter().filter(|r| *r != Role::Tutor) {
            let err = check_link("tutor", Some(&user(role, true)), Role::Tutor).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
            assert_eq!(err.field(), Some("tutor"));
        }
        for role in Role::ALL.into_iter().filter(|r| *r != Role::Parent) {
            let err = check_link("parent", Some(&user(role, true)), Role::Parent).unwrap_err();
            assert_eq!(err.field(), Some("parent"));
        }
    }

    #[test]
    fn test_inactive_and_missing_fail() {
        let err = check_link("tutor", Some(&user(Role::Tutor, false)), Role::Tutor).unwrap_err();
        assert_eq!(err.field(), Some("tutor"));

        let err = check_link("parent", None, Role::Parent).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.field(), Some("parent"));
    }

    #[test]
    fn test_validate_dto_reports_nested_field() {
        let dto = CreateStudentWithParentDto {
            student: NewStudentDto {
                first_name: "Ivan".into(),
                last_name: "Petrov".into(),
                email: None,
                grade: String::new(),
                goal: String::new(),
            },
            parent: NewParentDto {
                first_name: String::new(),
                last_name: String::new(),
                email: "not-an-email".into(),
            },
        };

        let err = validate_dto(&dto).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.field(), Some("parent.email"));
    }
}
