//! Standard error responses
//!
//! Every failure leaves the service as
//! `{"error": {"code", "message", "details", "request_id"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::http::request_id::current_request_id;
use crate::store::SupabaseError;

/// Message returned for failures whose cause must stay in the logs
pub const GENERIC_SERVER_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// One failed field in a validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{message}")]
    Validation { message: String, errors: Vec<FieldError> },

    #[error("{0}")]
    TooManyRequests(String),

    /// Server-side failure with a message that is safe to show
    #[error("{0}")]
    Server(String),

    /// Failure with a domain-specific code
    #[error("{message}")]
    Coded {
        status: StatusCode,
        code: &'static str,
        message: String,
    },

    /// Unexpected failure; the cause is logged, never returned
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        ApiError::Validation {
            message: "Request validation failed".to_string(),
            errors,
        }
    }

    /// Log an upstream failure and surface only `context` to the client
    pub fn upstream(context: &str, err: &SupabaseError) -> Self {
        error!(error = %err, status = ?err.status(), "{}", context);
        ApiError::Server(context.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Server(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Coded { status, .. } => *status,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::Validation { .. } => "validation_error",
            ApiError::TooManyRequests(_) => "rate_limited",
            ApiError::Server(_) | ApiError::Internal(_) => "server_error",
            ApiError::Coded { code, .. } => code,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => GENERIC_SERVER_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Value {
        match self {
            ApiError::Validation { errors, .. } => json!({ "errors": errors }),
            _ => json!({}),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = current_request_id().unwrap_or_else(|| "unknown".to_string());

        if status.is_server_error() {
            error!(code = self.code(), status = status.as_u16(), error = %self, "API error");
        } else {
            warn!(code = self.code(), status = status.as_u16(), message = %self, "API error");
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.public_message(),
                "details": self.details(),
                "request_id": request_id,
            }
        });

        (status, Json(body)).into_response()
    }
}
