use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error ({code}): {message}")]
    ValidationError { code: String, message: String },

    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String, details: Option<Value> },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ValidationError { code: code.into(), message: message.into() }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>, details: Option<Value>) -> Self {
        AppError::Conflict { code: code.into(), message: message.into(), details }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::ValidationError { code, message } => json!({
                "error": message,
                "code": code,
            }),
            AppError::Conflict { code, message, details } => json!({
                "error": message,
                "code": code,
                "details": details,
            }),
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg)
            | AppError::Database(msg)
            | AppError::ServiceUnavailable(msg) => json!({ "error": msg }),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, self);
        } else {
            tracing::debug!("Rejected request: {}: {}", status, self);
        }

        (status, Json(body)).into_response()
    }
}
