use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::validation::ValidationErrors;

static PRODUCTION: OnceLock<bool> = OnceLock::new();

/// Hide underlying error details from 500 responses. Fixed at start-up;
/// returns false if the mode was already set.
pub fn set_production_mode(enabled: bool) -> bool {
    PRODUCTION.set(enabled).is_ok()
}

fn production_mode() -> bool {
    PRODUCTION.get().copied().unwrap_or(false)
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    SelfReference(String),

    #[error("Token is invalid or has expired.")]
    InvalidOrExpiredToken,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::SelfReference(_)
            | AppError::InvalidOrExpiredToken => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Json(_)
            | AppError::Mail(_)
            | AppError::Upload(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} not found.", what))
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl AppError {
    /// The `{status, message, ...}` body for this error.
    fn envelope(&self, production: bool) -> Value {
        if self.status_code().is_server_error() {
            let message = "An unexpected error occurred while processing your request.";
            if production {
                json!({ "status": "error", "message": message })
            } else {
                json!({ "status": "error", "message": message, "error": self.to_string() })
            }
        } else {
            match self {
                AppError::Validation(errors) => json!({
                    "status": "fail",
                    "message": self.to_string(),
                    "data": errors.fields(),
                }),
                _ => json!({ "status": "fail", "message": self.to_string() }),
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Unexpected error: {}", self);
        }
        (status, Json(self.envelope(production_mode()))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
