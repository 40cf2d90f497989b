//! Error types for SessionVault services
//!
//! Every failure a handler can produce is an [`AppError`]. The variant decides
//! the HTTP status and the body shape:
//! - client errors answer `{status, message}` with a fixed message
//! - server errors answer only the generic `{message}` and log the detail

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Body returned for every 5xx response
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong! Please try again later.";

pub const MISSING_FIELDS_MESSAGE: &str = "Name and value are required fields.";
pub const DUPLICATE_NAME_MESSAGE: &str =
    "Session with this name already exists. Please choose a different name.";
pub const SESSION_NOT_FOUND_MESSAGE: &str = "Session not found.";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Resource errors
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    // Conflict errors
    #[error("Duplicate resource: {message}")]
    Duplicate { message: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Missing `name` or `value` on a session payload
    pub fn missing_fields(field: Option<String>) -> Self {
        AppError::Validation {
            message: MISSING_FIELDS_MESSAGE.to_string(),
            field,
        }
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        AppError::SessionNotFound { id: id.into() }
    }

    /// Another live record already carries this name
    pub fn duplicate_name() -> Self {
        AppError::Duplicate {
            message: DUPLICATE_NAME_MESSAGE.to_string(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,

            // Duplicates are answered with 202 Accepted, not 409
            AppError::Duplicate { .. } => StatusCode::ACCEPTED,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation { message, .. }
            | AppError::Unauthorized { message }
            | AppError::Duplicate { message } => message.clone(),
            AppError::SessionNotFound { .. } => SESSION_NOT_FOUND_MESSAGE.to_string(),
            AppError::RateLimited { .. } => "Too many requests. Please slow down.".to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::duplicate_name(),
            _ => AppError::Database(err),
        }
    }
}

/// Error body for client errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Error body for server errors; carries no status field
#[derive(Debug, Serialize, Deserialize)]
pub struct ServerErrorResponse {
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                "Server error"
            );

            let body = ServerErrorResponse {
                message: GENERIC_ERROR_MESSAGE.to_string(),
            };
            return (status, Json(body)).into_response();
        }

        tracing::warn!(
            error = %self,
            status = status.as_u16(),
            "Client error"
        );

        let body = ErrorResponse {
            status: status.as_u16(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}
