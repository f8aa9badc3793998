// ABOUTME: HTTP side of rate limiting: client address resolution, headers, and 429 responses
// ABOUTME: The counting itself lives in crate::rate_limiting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Rate Limiting Middleware with HTTP Headers
//!
//! Adds the standard rate limit headers to API responses and builds the
//! `429 Too Many Requests` response when a client exceeds its ceiling.

use crate::errors::AppError;
use crate::rate_limiting::RateLimitDecision;
use atelier_core::constants::rate_limits::UNKNOWN_CLIENT;
use axum::extract::ConnectInfo;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use http::{Extensions, HeaderMap, HeaderValue};
use std::net::SocketAddr;

/// HTTP header names for rate limiting
pub mod headers {
    /// HTTP header name for maximum requests allowed in the current window
    pub const X_RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
    /// HTTP header name for remaining requests in the current window
    pub const X_RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
    /// HTTP header name for Unix timestamp when rate limit resets
    pub const X_RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
    /// HTTP header name for retry-after duration in seconds
    pub const RETRY_AFTER: &str = "Retry-After";
}

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Address used to key rate limit counters
///
/// Behind a trusted proxy (`TRUST_PROXY_HEADERS`) takes the first
/// `X-Forwarded-For` entry, then `X-Real-IP`. Otherwise those headers are
/// client-controlled and ignored. Falls back to the socket peer, then
/// `unknown`.
#[must_use]
pub fn client_address(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_proxy_headers: bool,
) -> String {
    let header_value = |name: &str| {
        if !trust_proxy_headers {
            return None;
        }
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(',').next().unwrap_or_default().trim())
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };

    header_value(X_FORWARDED_FOR)
        .or_else(|| header_value(X_REAL_IP))
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

/// Create a `HeaderMap` with rate limit headers
///
/// `Retry-After` is only added for rejected requests.
#[must_use]
pub fn create_rate_limit_headers(decision: &RateLimitDecision, now: DateTime<Utc>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(headers::X_RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(
        headers::X_RATE_LIMIT_REMAINING,
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        headers::X_RATE_LIMIT_RESET,
        HeaderValue::from(decision.reset_at.timestamp()),
    );
    if !decision.allowed {
        headers.insert(
            headers::RETRY_AFTER,
            HeaderValue::from(decision.retry_after_secs(now)),
        );
    }
    headers
}

/// Build the 429 response for a rejected request
#[must_use]
pub fn create_rate_limit_response(decision: &RateLimitDecision, now: DateTime<Utc>) -> Response {
    let error = AppError::rate_limit_exceeded(decision.limit, decision.retry_after_secs(now));
    (create_rate_limit_headers(decision, now), error).into_response()
}
