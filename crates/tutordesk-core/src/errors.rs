//! Application error type and the client-facing error taxonomy.
//!
//! Every failure surfaced by a service is an [`AppError`]. The error carries
//! the full cause for operators, while the HTTP body only ever contains a
//! generic, localized message derived from its [`ErrorKind`].

use anyhow::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Classification of failures. Drives the status code, the public message
/// and the log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The actor lacks the role or relationship required for the operation.
    Authorization,
    /// A field violates a business rule or input constraint.
    Validation,
    /// The bounded identifier allocation loop hit its cap.
    IdentifierExhausted,
    /// The store refused a delete because dependent rows exist.
    ProtectedReference,
    NotFound,
    /// Timeouts and connection loss; eligible for retry.
    Transient,
    Internal,
}

/// Language of the public error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::Validation | Self::IdentifierExhausted | Self::ProtectedReference => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Transient => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code included in responses.
    pub fn code(self) -> &'static str {
        match self {
            Self::Authorization => "forbidden",
            Self::Validation => "invalid",
            Self::IdentifierExhausted => "identifier_unavailable",
            Self::ProtectedReference => "in_use",
            Self::NotFound => "not_found",
            Self::Transient => "unavailable",
            Self::Internal => "internal",
        }
    }

    pub fn public_message(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::Authorization, Locale::En) => "You are not allowed to perform this action.",
            (Self::Authorization, Locale::Ru) => "У вас нет прав на это действие.",
            (Self::Validation, Locale::En) => "The submitted data is invalid.",
            (Self::Validation, Locale::Ru) => "Переданные данные некорректны.",
            (Self::IdentifierExhausted, Locale::En) => {
                "Could not allocate a login for this account. Please adjust the name and try again."
            }
            (Self::IdentifierExhausted, Locale::Ru) => {
                "Не удалось подобрать логин для аккаунта. Измените имя и повторите попытку."
            }
            (Self::ProtectedReference, Locale::En) => {
                "This record is still in use and cannot be removed."
            }
            (Self::ProtectedReference, Locale::Ru) => {
                "Запись используется и не может быть удалена."
            }
            (Self::NotFound, Locale::En) => "The requested record was not found.",
            (Self::NotFound, Locale::Ru) => "Запрошенная запись не найдена.",
            (Self::Transient, Locale::En) => "The service is temporarily unavailable.",
            (Self::Transient, Locale::Ru) => "Сервис временно недоступен.",
            (Self::Internal, Locale::En) => "An unexpected error occurred.",
            (Self::Internal, Locale::Ru) => "Произошла непредвиденная ошибка.",
        }
    }

    /// Whether the failure is attributable to the caller's input or rights.
    pub fn is_client_error(self) -> bool {
        self.status().is_client_error()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    /// Offending field, for in-process callers. Never serialized.
    pub field: Option<String>,
    pub error: Error,
}

impl AppError {
    pub fn new<E>(kind: ErrorKind, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status: kind.status(),
            kind,
            field: None,
            error: err.into(),
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Internal, err)
    }

    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::NotFound, err)
    }

    pub fn forbidden<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Authorization, err)
    }

    pub fn validation<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Validation, err)
    }

    /// Validation failure attributed to a single field.
    pub fn invalid_field<E>(field: impl Into<String>, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Validation, err).with_field(field)
    }

    pub fn exhausted<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::IdentifierExhausted, err)
    }

    pub fn protected<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::ProtectedReference, err)
    }

    pub fn transient<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Transient, err)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Response body for the given locale: code and generic message only.
    pub fn public_body(&self, locale: Locale) -> serde_json::Value {
        json!({
            "error": self.kind.public_message(locale),
            "code": self.kind.code(),
        })
    }

    fn log(&self) {
        if self.kind.is_client_error() {
            tracing::warn!(
                error.kind = %self.kind,
                error.field = self.field.as_deref().unwrap_or(""),
                error.message = ?self.error,
                "Request rejected"
            );
        } else {
            tracing::error!(
                error.kind = %self.kind,
                error.message = ?self.error,
                "Request failed"
            );
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} ({}): {}", self.kind, field, self.error),
            None => write!(f, "{}: {}", self.kind, self.error),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        (self.status, Json(self.public_body(Locale::default()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_kind_status_mapping() {
        assert_eq!(ErrorKind::Authorization.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::IdentifierExhausted.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::ProtectedReference.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Transient.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ErrorKind::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_body_hides_cause_and_field() {
        let err = AppError::invalid_field("tutor", anyhow!("user 42 has role teacher"));
        let body = err.public_body(Locale::En).to_string();

        assert!(!body.contains("tutor"));
        assert!(!body.contains("42"));
        assert!(body.contains("invalid"));
        assert_eq!(err.field(), Some("tutor"));
    }

    #[test]
    fn test_localized_messages_differ() {
        let en = ErrorKind::NotFound.public_message(Locale::En);
        let ru = ErrorKind::NotFound.public_message(Locale::Ru);
        assert_ne!(en, ru);
    }

    #[tokio::test]
    async fn test_into_response_status() {
        let response = AppError::protected(anyhow!("subject has lessons")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
