// ABOUTME: Axum response conversion for AppError with environment-aware logging
// ABOUTME: The only place where application errors become HTTP responses
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{error_reporting, AppError, ErrorResponse};
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use http::StatusCode;
use tracing::{error, warn};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let reporting = error_reporting();
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let timestamp = Utc::now().to_rfc3339();

        if status.is_server_error() {
            error!(
                timestamp = %timestamp,
                environment = %reporting.environment,
                error.code = ?self.code,
                http.status = status.as_u16(),
                error.source = ?self.source,
                "{}",
                self.message
            );
        } else {
            warn!(
                timestamp = %timestamp,
                environment = %reporting.environment,
                error.code = ?self.code,
                http.status = status.as_u16(),
                "{}",
                self.message
            );
        }

        let body = ErrorResponse::from_error(&self, reporting.expose_internal_details);
        (status, Json(body)).into_response()
    }
}

/// Malformed or wrongly typed JSON bodies are client input errors
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_input(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}
