// Error taxonomy shared by the services and the HTTP layer.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::GenerationError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or empty required input.
    #[error("{0}")]
    Validation(String),

    /// Generation endpoint failed or answered with an unusable body.
    #[error("Error generating story: {0}")]
    Upstream(String),

    /// The continuation contained no sentence fragments.
    #[error("Generated story was empty")]
    EmptyContent,

    /// A referenced story or user record is absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    /// Failure inside this service unrelated to the store or generator.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) | AppError::EmptyContent => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(e: GenerationError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

// Malformed JSON, a missing field, or the wrong content type.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

pub fn json_error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Persistence(e) => {
                tracing::error!("Database error: {e}");
                json_error(status, "Internal server error")
            }
            AppError::Upstream(_) | AppError::EmptyContent => {
                tracing::error!("{self}");
                json_error(status, &self.to_string())
            }
            _ => json_error(status, &self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("Missing required fields.".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Upstream("503".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::EmptyContent.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::NotFound("Story").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Forbidden("no".into()).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let e = AppError::Validation("Missing required fields.".into());
        assert_eq!(e.to_string(), "Missing required fields.");
        assert_eq!(AppError::NotFound("User").to_string(), "User not found");
    }

    #[test]
    fn test_generation_error_becomes_upstream() {
        let e: AppError = GenerationError::Api {
            status: 503,
            message: "overloaded".into(),
        }
        .into();
        assert!(matches!(e, AppError::Upstream(_)));
        assert!(e.to_string().contains("503"));
    }
}
