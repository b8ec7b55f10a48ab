//! Store errors and their translation into [`AppError`].

use tutordesk_core::AppError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Constraint name of the global username uniqueness rule.
pub const USERNAME_UNIQUE: &str = "users_username_key";

/// At most one active enrollment per student, subject and teacher.
pub const ACTIVE_ENROLLMENT_UNIQUE: &str = "subject_enrollments_active_triple";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("check constraint violated: {constraint}")]
    CheckViolation { constraint: String },

    /// An insert or update pointed at a row that does not exist.
    #[error("referenced row does not exist: {constraint}")]
    MissingReference { constraint: String },

    /// A delete was refused because other rows still depend on the target.
    #[error("{entity} is still referenced by {}", dependents.join(", "))]
    ProtectedReference {
        entity: String,
        dependents: Vec<String>,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("transient store failure: {0}")]
    Transient(#[source] BoxError),

    #[error("database error: {0}")]
    Database(#[source] BoxError),
}

impl StoreError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into().into())
    }

    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint } if constraint == name)
    }

    /// Translate a sqlx error raised by an insert, update or select.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().unwrap_or_default().to_string();
                if db_err.is_unique_violation() {
                    Self::UniqueViolation { constraint }
                } else if db_err.is_check_violation() {
                    Self::CheckViolation { constraint }
                } else if db_err.is_foreign_key_violation() {
                    Self::MissingReference { constraint }
                } else {
                    Self::Database(Box::new(sqlx::Error::Database(db_err)))
                }
            }
            err @ (sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed) => Self::Transient(Box::new(err)),
            err => Self::Database(Box::new(err)),
        }
    }

    /// Translate a sqlx error raised by a delete of `entity`; foreign key
    /// violations mean the row is still referenced.
    pub fn from_sqlx_delete(err: sqlx::Error, entity: &str) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                let constraint = db_err.constraint().unwrap_or_default();
                Self::ProtectedReference {
                    entity: entity.to_string(),
                    dependents: vec![dependent_table(constraint).to_string()],
                }
            }
            err => Self::from_sqlx(err),
        }
    }
}

/// Table that owns a constraint, derived from the constraint's name prefix.
fn dependent_table(constraint: &str) -> &str {
    const TABLES: [&str; 3] = ["subject_enrollments", "lessons", "student_profiles"];
    TABLES
        .into_iter()
        .find(|table| constraint.starts_with(table))
        .unwrap_or("dependent records")
}

/// Field a constraint guards, for validation errors.
fn constraint_field(constraint: &str) -> Option<&'static str> {
    if constraint.contains("tutor") {
        Some("tutor")
    } else if constraint.contains("parent") {
        Some("parent")
    } else if constraint.contains("username") {
        Some("username")
    } else {
        None
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let field = match &err {
            StoreError::UniqueViolation { constraint }
            | StoreError::CheckViolation { constraint }
            | StoreError::MissingReference { constraint } => constraint_field(constraint),
            _ => None,
        };

        let app = match err {
            StoreError::UniqueViolation { .. }
            | StoreError::CheckViolation { .. }
            | StoreError::MissingReference { .. } => AppError::validation(err),
            StoreError::ProtectedReference { .. } => AppError::protected(err),
            StoreError::NotFound(_) => AppError::not_found(err),
            StoreError::Transient(_) => AppError::transient(err),
            StoreError::Database(_) => AppError::internal(err),
        };

        match field {
            Some(field) => app.with_field(field),
            None => app,
        }
    }
}
