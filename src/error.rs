use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Rejected credentials or token. Reported to the caller, never fatal.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A programming error, e.g. an unknown feed mode.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Could not generate a unique username after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

fn internal(code: &'static str) -> (StatusCode, ErrorBody) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody {
            code,
            message: "Internal server error".to_string(),
            field: None,
        },
    )
}

fn body(code: &'static str, message: String) -> ErrorBody {
    ErrorBody {
        code,
        message,
        field: None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                body("NOT_FOUND", format!("{what} not found")),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                body("UNAUTHORIZED", "Sign in to continue".to_string()),
            ),
            AppError::Auth(message) => (StatusCode::BAD_REQUEST, body("AUTH_ERROR", message)),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message,
                    field: Some(field),
                },
            ),
            AppError::Conflict(message) => (StatusCode::CONFLICT, body("CONFLICT", message)),
            AppError::PayloadTooLarge(message) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                body("PAYLOAD_TOO_LARGE", message),
            ),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                internal("CONFIGURATION_ERROR")
            }
            AppError::GenerationExhausted { attempts } => {
                tracing::error!("Username generation exhausted after {} attempts", attempts);
                internal("INTERNAL_ERROR")
            }
            AppError::Backend(BackendError::Auth(message)) => {
                (StatusCode::UNAUTHORIZED, body("UNAUTHORIZED", message))
            }
            AppError::Backend(BackendError::Forbidden(message)) => {
                tracing::warn!("Backend refused write: {}", message);
                (
                    StatusCode::FORBIDDEN,
                    body("FORBIDDEN", "Not allowed".to_string()),
                )
            }
            AppError::Backend(BackendError::NotFound) => (
                StatusCode::NOT_FOUND,
                body("NOT_FOUND", "Not found".to_string()),
            ),
            AppError::Backend(BackendError::ForeignKey(detail)) => {
                tracing::debug!("Foreign key violation: {}", detail);
                (
                    StatusCode::NOT_FOUND,
                    body("NOT_FOUND", "Referenced item does not exist".to_string()),
                )
            }
            AppError::Backend(BackendError::Conflict(detail)) => {
                (StatusCode::CONFLICT, body("CONFLICT", detail))
            }
            AppError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                internal("BACKEND_ERROR")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal("INTERNAL_ERROR")
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
