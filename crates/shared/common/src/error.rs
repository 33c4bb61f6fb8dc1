//! Unified error handling.
//!
//! Provides a single error type for the services, convertible to an Axum
//! HTTP response for the service's small HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Required settings missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    // External service errors
    #[cfg(feature = "database")]
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[error("Mail transport error: {0}")]
    Mail(String),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body for HTTP
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            #[cfg(feature = "database")]
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Mail(_) => "MAIL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Mail(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            // Operators need to know which setting is missing
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                format!("Service is misconfigured: {}", msg)
            }

            // Hide details for internal errors
            #[cfg(feature = "database")]
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Mail(msg) => {
                tracing::error!("Mail transport error: {}", msg);
                "The mail transport rejected the message".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
        }
    }
}

// =============================================================================
// HTTP Response (Axum)
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn mail(msg: impl Into<String>) -> Self {
        AppError::Mail(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_the_setting() {
        let err = AppError::configuration("NOTIFICATION_EMAIL is not set");
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.user_message().contains("NOTIFICATION_EMAIL"));
    }

    #[test]
    fn mail_error_hides_transport_details() {
        let err = AppError::mail("connection refused");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.user_message(), "The mail transport rejected the message");
    }

    #[test]
    fn internal_error_hides_details() {
        let err = AppError::internal("pool exhausted");
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.user_message(), "An internal error occurred");
    }
}
