//! Cache key scheme.
//!
//! Keys are built without the deployment prefix; [`RedisCache`](crate::RedisCache)
//! applies it. Every read model cached by the API layer must use a key from
//! here so that [`CacheTarget`] can find it again.

use tutordesk_models::{SubjectId, UserId};

fn build_key(parts: &[&str]) -> String {
    parts.join(":")
}

/// Cache keys for user accounts.
pub mod users {
    use super::*;

    /// Key for an account (user and profile) by ID.
    pub fn by_id(user_id: UserId) -> String {
        build_key(&["user", &user_id.to_string()])
    }

    /// Pattern matching every key derived from one user.
    pub fn invalidation_pattern(user_id: UserId) -> String {
        format!("user:{user_id}:*")
    }
}

/// Cache keys for student data.
pub mod students {
    use super::*;

    pub fn by_id(student_id: UserId) -> String {
        build_key(&["student", &student_id.to_string()])
    }

    /// Key for the list of students assigned to a tutor.
    pub fn roster(tutor_id: UserId) -> String {
        build_key(&["tutor", &tutor_id.to_string(), "students"])
    }
}

/// Cache keys for subject enrollments.
pub mod enrollments {
    use super::*;

    pub fn by_student(student_id: UserId) -> String {
        build_key(&["student", &student_id.to_string(), "enrollments"])
    }
}

/// Cache keys for subjects.
pub mod subjects {
    use super::*;

    pub fn by_id(subject_id: SubjectId) -> String {
        build_key(&["subject", &subject_id.to_string()])
    }

    pub fn list() -> String {
        build_key(&["subjects", "list"])
    }
}

/// Something whose cached read models became stale after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTarget {
    User(UserId),
    Student {
        student: UserId,
        tutor: Option<UserId>,
    },
    TutorRoster(UserId),
    Enrollments(UserId),
    Subject(SubjectId),
}

impl CacheTarget {
    /// Exact keys to delete.
    pub fn keys(&self) -> Vec<String> {
        match *self {
            CacheTarget::User(id) => vec![users::by_id(id)],
            CacheTarget::Student { student, tutor } => {
                let mut keys = vec![
                    users::by_id(student),
                    students::by_id(student),
                    enrollments::by_student(student),
                ];
                keys.extend(tutor.map(students::roster));
                keys
            }
            CacheTarget::TutorRoster(tutor) => vec![students::roster(tutor)],
            CacheTarget::Enrollments(student) => {
                vec![enrollments::by_student(student), students::by_id(student)]
            }
            CacheTarget::Subject(id) => vec![subjects::by_id(id), subjects::list()],
        }
    }

    /// Key patterns to delete by scanning.
    pub fn patterns(&self) -> Vec<String> {
        match *self {
            CacheTarget::User(id) => vec![users::invalidation_pattern(id)],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_target_covers_roster() {
        let (student, tutor) = (UserId::new(), UserId::new());
        let keys = CacheTarget::Student {
            student,
            tutor: Some(tutor),
        }
        .keys();

        assert!(keys.contains(&format!("student:{student}")));
        assert!(keys.contains(&format!("student:{student}:enrollments")));
        assert!(keys.contains(&format!("tutor:{tutor}:students")));
    }

    #[test]
    fn test_student_target_without_tutor() {
        let student = UserId::new();
        let keys = CacheTarget::Student {
            student,
            tutor: None,
        }
        .keys();
        assert_eq!(keys.len(), 3);
        assert!(!keys.iter().any(|k| k.starts_with("tutor:")));
    }

    #[test]
    fn test_only_user_target_scans() {
        let user = UserId::new();
        assert_eq!(
            CacheTarget::User(user).patterns(),
            vec![format!("user:{user}:*")]
        );
        assert!(CacheTarget::Subject(SubjectId::new()).patterns().is_empty());
    }
}
