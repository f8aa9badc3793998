// ABOUTME: reqwest client builder and provider error mapping shared by all outbound calls
// ABOUTME: Timeouts become 503s; 4xx responses are forwarded with the provider's message
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::errors::{AppError, AppResult};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, warn};

/// Connection establishment timeout, bounded by the request timeout
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Build an HTTP client with a per-request timeout
///
/// # Errors
///
/// Returns an internal error if the TLS backend cannot be initialised
pub fn build_client(timeout_secs: u64) -> AppResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS.min(timeout_secs)))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))
}

/// Map a transport failure to a 503
#[must_use]
pub fn map_send_error(service: &str, e: &reqwest::Error) -> AppError {
    if e.is_timeout() {
        warn!(service, "External request timed out");
        AppError::external_timeout(service)
    } else if e.is_connect() {
        error!(service, error = %e, "Cannot connect to external service");
        AppError::external_service(service, "service unreachable")
    } else {
        error!(service, error = %e, "External request failed");
        AppError::external_service(service, format!("request failed: {e}"))
    }
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: Option<ProviderErrorDetail>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderErrorDetail {
    Object { message: Option<String> },
    Text(String),
}

/// Pull a human-readable message out of a provider error body
///
/// Understands `{"error": {"message": ...}}`, `{"error": "..."}` and
/// `{"message": ...}`; otherwise falls back to a prefix of the raw body.
#[must_use]
pub fn provider_error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ProviderErrorBody>(body).ok();
    let message = parsed.and_then(|body| match body.error {
        Some(ProviderErrorDetail::Object { message }) => message.or(body.message),
        Some(ProviderErrorDetail::Text(text)) => Some(text),
        None => body.message,
    });
    message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status.to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    })
}

/// Read a provider response, decoding success bodies as `T`
///
/// # Errors
///
/// Forwards 4xx with the provider's message, maps other failures to a 503,
/// and reports undecodable bodies as provider errors
pub async fn decode_response<T: DeserializeOwned>(service: &str, response: Response) -> AppResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| map_send_error(service, &e))?;

    if !status.is_success() {
        let message = provider_error_message(status, &body);
        warn!(service, status = status.as_u16(), %message, "External service rejected request");
        return Err(AppError::external_rejected(service, status.as_u16(), message));
    }

    serde_json::from_str(&body).map_err(|e| {
        error!(service, error = %e, "Failed to decode external response");
        AppError::external_service(service, format!("unexpected response: {e}"))
    })
}
