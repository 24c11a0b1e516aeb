// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::database::StoreError;
use crate::services::ServiceError;
use crate::validation::{AttackMatch, ValidationErrors};

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 429 Too Many Requests
    TooManyRequests {
        message: String,
        retry_after_secs: Option<i64>,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::TooManyRequests { .. } => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PayloadTooLarge(msg) => msg,
            ApiError::TooManyRequests { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>, retry_after_secs: Option<i64>) -> Self {
        ApiError::TooManyRequests {
            message: message.into(),
            retry_after_secs,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

/// Refusals raised by the request pipeline and the service layer. Every
/// variant carries enough context for the audit entry; the HTTP response
/// built from it never does.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("attack pattern '{}' in field '{}'", .0.kind, .0.field)]
    AttackPatternDetected(AttackMatch),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("authorization denied: {required}")]
    AuthorizationDenied { required: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: i64 },

    #[error("missing or invalid CSRF token")]
    CsrfInvalid,

    #[error("origin '{origin}' is not allowed")]
    CorsRejected { origin: String },

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("system error: {0}")]
    System(String),
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::Validation(errors) => {
                ApiError::validation_error("Validation failed", Some(errors.to_field_map()))
            }
            SecurityError::AttackPatternDetected(_) => {
                ApiError::bad_request("Request contains disallowed content")
            }
            SecurityError::AuthenticationRequired(_) => ApiError::unauthorized("Authentication required"),
            SecurityError::AuthorizationDenied { .. } => ApiError::forbidden("Insufficient permissions"),
            SecurityError::RateLimitExceeded { retry_after_secs } => {
                ApiError::too_many_requests("Too many requests, please try again later", Some(retry_after_secs))
            }
            SecurityError::CsrfInvalid => ApiError::forbidden("Invalid CSRF token"),
            SecurityError::CorsRejected { .. } => ApiError::forbidden("Origin not allowed"),
            SecurityError::PayloadTooLarge { limit } => {
                ApiError::payload_too_large(format!("Request body exceeds {} bytes", limit))
            }
            SecurityError::System(msg) => {
                // Detail goes to the audit trail and logs, never to the caller
                tracing::error!("Security pipeline fault: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
            StoreError::Serialization(e) => {
                tracing::error!("Document serialization error: {}", e);
                ApiError::internal_server_error("Failed to read stored data")
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => SecurityError::Validation(errors).into(),
            ServiceError::Attack(hit) => SecurityError::AttackPatternDetected(hit).into(),
            ServiceError::Forbidden(required) => SecurityError::AuthorizationDenied { required }.into(),
            ServiceError::RateLimited { retry_after_secs } => {
                SecurityError::RateLimitExceeded { retry_after_secs }.into()
            }
            ServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Store(e) => e.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = match &self {
            ApiError::TooManyRequests { retry_after_secs: Some(secs), .. } => Some(*secs),
            _ => None,
        };
        let mut response = (status, Json(self.to_json())).into_response();
        if let Some(value) = retry_after.and_then(|secs| HeaderValue::from_str(&secs.to_string()).ok()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::AttackKind;

    #[test]
    fn security_errors_map_to_safe_responses() {
        let err: ApiError = SecurityError::System("connection reset by peer at 10.0.0.7".into()).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("10.0.0.7"));

        let err: ApiError = SecurityError::AttackPatternDetected(AttackMatch {
            field: "notes".into(),
            kind: AttackKind::SqlInjection,
        })
        .into();
        assert_eq!(err.status_code(), 400);
        assert!(!err.message().contains("notes"));

        let err: ApiError = SecurityError::CsrfInvalid.into();
        assert_eq!(err.status_code(), 403);
        let err: ApiError = SecurityError::RateLimitExceeded { retry_after_secs: 30 }.into();
        assert_eq!(err.status_code(), 429);
        let response = err.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
        let err: ApiError = SecurityError::PayloadTooLarge { limit: 10 }.into();
        assert_eq!(err.error_code(), "PAYLOAD_TOO_LARGE");
    }

    #[test]
    fn validation_errors_carry_field_map() {
        let err: ApiError = SecurityError::Validation(ValidationErrors::single("email", "Invalid email address")).into();
        let body = err.to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["email"], "Invalid email address");
    }
}
