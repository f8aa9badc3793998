// ABOUTME: Unified error taxonomy with stable codes, HTTP status mapping, and response bodies
// ABOUTME: Internal components return AppResult and only the HTTP boundary formats responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Unified Error Handling System
//!
//! Every fallible operation in the server returns [`AppResult`]. The error
//! carries a stable [`ErrorCode`] that decides the HTTP status, a message for
//! the client, optional structured details (for example the list of invalid
//! fields), and an optional source for logging.
//!
//! Responses are produced only at the HTTP boundary (see the `http` module,
//! behind the `http-response` feature). In production, 5xx responses carry a
//! generic description instead of internal detail.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error as StdError;
use std::sync::OnceLock;
use thiserror::Error;

/// `IntoResponse` support for axum handlers
#[cfg(feature = "http-response")]
pub mod http;

/// `From<sqlx::Error>` conversion
#[cfg(feature = "database-errors")]
pub mod database;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication & Authorization
    /// No verified session was presented
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    /// Credentials or token were rejected
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid,
    /// The caller is known but does not own the resource
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied,

    // Rate Limiting
    /// Fixed-window ceiling reached
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,

    // Validation
    /// Malformed or out-of-range input
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    /// One or more required fields were absent
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField,

    // Resource Management
    /// Unknown identifier
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    /// Uniqueness violation, such as a duplicate account email
    #[serde(rename = "RESOURCE_ALREADY_EXISTS")]
    ResourceAlreadyExists,
    /// Write against an anonymous identity that has already been migrated
    #[serde(rename = "IDENTITY_MIGRATED")]
    IdentityMigrated,

    // External Services
    /// Provider failed or returned a server error
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalServiceError,
    /// Provider could not be reached in time
    #[serde(rename = "EXTERNAL_SERVICE_UNAVAILABLE")]
    ExternalServiceUnavailable,
    /// Provider rejected the request with a client error that is forwarded as-is
    #[serde(rename = "EXTERNAL_REQUEST_REJECTED")]
    ExternalRequestRejected,

    // Configuration
    /// Configuration value is invalid
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError,
    /// Required configuration value is absent
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing,

    // Internal Errors
    /// Unexpected failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    /// Database operation failed
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    /// Data serialization/deserialization failed
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidInput | Self::MissingRequiredField => 400,

            // 401 Unauthorized
            Self::AuthRequired | Self::AuthInvalid => 401,

            // 403 Forbidden
            Self::PermissionDenied => 403,

            // 404 Not Found
            Self::ResourceNotFound => 404,

            // 409 Conflict
            Self::ResourceAlreadyExists | Self::IdentityMigrated => 409,

            // 429 Too Many Requests
            Self::RateLimitExceeded => 429,

            // 503 Service Unavailable; rejected requests normally carry the provider's own status
            Self::ExternalServiceError
            | Self::ExternalServiceUnavailable
            | Self::ExternalRequestRejected => 503,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::SerializationError
            | Self::ConfigError
            | Self::ConfigMissing => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication is required to access this resource",
            Self::AuthInvalid => "The provided authentication credentials are invalid",
            Self::PermissionDenied => "You do not have permission to perform this action",
            Self::RateLimitExceeded => "Rate limit exceeded. Please slow down your requests",
            Self::InvalidInput => "The provided input is invalid",
            Self::MissingRequiredField => "A required field is missing from the request",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ResourceAlreadyExists => "A resource with this identifier already exists",
            Self::IdentityMigrated => "This anonymous session has already been claimed",
            Self::ExternalServiceError => "An external service encountered an error",
            Self::ExternalServiceUnavailable => "An external service is currently unavailable",
            Self::ExternalRequestRejected => "An external service rejected the request",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigMissing => "Required configuration is missing",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
#[error("{}: {message}", .code.description())]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Structured details (`Value::Null` when absent)
    pub details: Value,
    /// Status reported by an external provider, forwarded instead of the code's default
    pub forwarded_status: Option<u16>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a new `AppError` with the given code and message
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Value::Null,
            forwarded_status: None,
            source: None,
        }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.forwarded_status
            .unwrap_or_else(|| self.code.http_status())
    }

    /// True when the error maps to a 5xx response
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Authentication required
    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, "Authentication required")
    }

    /// Invalid authentication
    #[must_use]
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// The caller does not own the resource
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Rate limit exceeded
    #[must_use]
    pub fn rate_limit_exceeded(limit: u32, retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded,
            format!("Rate limit of {limit} requests exceeded"),
        )
        .with_details(serde_json::json!({
            "limit": limit,
            "retryAfter": retry_after_secs,
        }))
    }

    /// Resource not found
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Invalid input
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Required fields were missing; the field names are reported in `details.fields`
    #[must_use]
    pub fn missing_fields(fields: &[&str]) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Missing required fields: {}", fields.join(", ")),
        )
        .with_details(serde_json::json!({ "fields": fields }))
    }

    /// Uniqueness conflict
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }

    /// Write against an already migrated anonymous identity
    #[must_use]
    pub fn identity_migrated() -> Self {
        Self::new(
            ErrorCode::IdentityMigrated,
            "Anonymous identity has been migrated to an account",
        )
    }

    /// Internal server error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Required configuration value is missing
    #[must_use]
    pub fn config_missing(key: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissing,
            format!("Missing configuration: {}", key.into()),
        )
    }

    /// Serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    /// External service error
    #[must_use]
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// External service did not answer within the configured timeout
    #[must_use]
    pub fn external_timeout(service: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceUnavailable,
            format!("{}: request timed out", service.into()),
        )
    }

    /// External service rejected the request
    ///
    /// Client errors (4xx) keep the provider's status and message so callers see
    /// exactly what the provider objected to. Any other status is treated as a
    /// provider failure.
    #[must_use]
    pub fn external_rejected(
        service: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        if (400..500).contains(&status) {
            let mut error = Self::new(ErrorCode::ExternalRequestRejected, message);
            error.forwarded_status = Some(status);
            error
        } else {
            Self::external_service(service, format!("status {status}: {}", message.into()))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {error}")).with_source(error)
    }
}

// ============================================================================
// Error reporting policy
// ============================================================================

/// Process-wide error reporting policy, registered once at startup
#[derive(Debug, Clone)]
pub struct ErrorReporting {
    /// Deployment environment stamped on every logged error
    pub environment: String,
    /// Include internal messages and details in 5xx response bodies
    pub expose_internal_details: bool,
}

impl Default for ErrorReporting {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            expose_internal_details: true,
        }
    }
}

static ERROR_REPORTING: OnceLock<ErrorReporting> = OnceLock::new();

/// Register the error reporting policy
///
/// Returns `false` when a policy was already registered; the first one wins.
pub fn configure_error_reporting(environment: impl Into<String>, expose_internal_details: bool) -> bool {
    ERROR_REPORTING
        .set(ErrorReporting {
            environment: environment.into(),
            expose_internal_details,
        })
        .is_ok()
}

/// Current error reporting policy (development defaults when unset)
#[must_use]
pub fn error_reporting() -> ErrorReporting {
    ERROR_REPORTING.get().cloned().unwrap_or_default()
}

// ============================================================================
// Response body
// ============================================================================

/// HTTP error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Error payload inside [`ErrorResponse`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable machine-readable code
    pub code: ErrorCode,
    /// Client-facing message
    pub message: String,
    /// Structured details, omitted when empty
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl ErrorResponse {
    /// Build the client-facing body for an error
    ///
    /// Server errors are reduced to the code's generic description unless
    /// `expose_internal_details` is set. Client errors always keep their message.
    #[must_use]
    pub fn from_error(error: &AppError, expose_internal_details: bool) -> Self {
        let redact = error.is_server_error() && !expose_internal_details;
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: if redact {
                    error.code.description().to_owned()
                } else {
                    error.message.clone()
                },
                details: if redact {
                    Value::Null
                } else {
                    error.details.clone()
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::AuthRequired.http_status(), 401);
        assert_eq!(ErrorCode::PermissionDenied.http_status(), 403);
        assert_eq!(ErrorCode::IdentityMigrated.http_status(), 409);
        assert_eq!(ErrorCode::RateLimitExceeded.http_status(), 429);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::ExternalServiceUnavailable.http_status(), 503);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn test_external_rejection_forwards_client_status() {
        let error = AppError::external_rejected("payments", 402, "Your card was declined.");
        assert_eq!(error.code, ErrorCode::ExternalRequestRejected);
        assert_eq!(error.http_status(), 402);
        assert_eq!(error.message, "Your card was declined.");

        let error = AppError::external_rejected("payments", 502, "bad gateway");
        assert_eq!(error.code, ErrorCode::ExternalServiceError);
        assert_eq!(error.http_status(), 503);
    }

    #[test]
    fn test_missing_fields_lists_fields() {
        let error = AppError::missing_fields(&["email", "password"]);
        assert_eq!(error.http_status(), 400);
        assert_eq!(error.details["fields"][0], "email");
        assert_eq!(error.details["fields"][1], "password");
    }

    #[test]
    fn test_production_response_hides_internal_detail() {
        let error = AppError::database("Failed to insert message: disk I/O error");
        let body = ErrorResponse::from_error(&error, false);
        assert_eq!(body.error.message, ErrorCode::DatabaseError.description());

        let body = ErrorResponse::from_error(&error, true);
        assert!(body.error.message.contains("disk I/O error"));
    }

    #[test]
    fn test_client_errors_keep_message_in_production() {
        let error = AppError::not_found("Conversation");
        let body = ErrorResponse::from_error(&error, false);
        assert_eq!(body.error.message, "Conversation not found");
    }

    #[test]
    fn test_error_response_serialization() {
        let error = AppError::rate_limit_exceeded(20, 42);
        let json = serde_json::to_string(&ErrorResponse::from_error(&error, false)).unwrap();
        assert!(json.contains("RATE_LIMIT_EXCEEDED"));
        assert!(json.contains("retryAfter"));
    }
}
