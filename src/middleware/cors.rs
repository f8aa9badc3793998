// ABOUTME: CORS layer wrapped around the API route group
// ABOUTME: Answers browser preflights before any rate limiting and tags responses for allowed origins
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::tracing::REQUEST_ID_HEADER;
use crate::config::SecurityConfig;
use http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use http::{HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Configure CORS for the `/api` routes
///
/// Configured from `CORS_ALLOWED_ORIGINS`:
///
/// ```bash
/// # Allow all origins (development); cookies are not shared cross-origin
/// export CORS_ALLOWED_ORIGINS="*"
///
/// # Allow specific origins (production); credentials allowed
/// export CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
/// ```
///
/// Requests from origins outside the list are still served, only without
/// CORS headers, so the browser withholds the response.
#[must_use]
pub fn setup_cors(config: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| HeaderValue::from_str(origin.trim_end_matches('/')).ok())
        .collect();
    let allow_any = origins.is_empty() || config.cors_origins.iter().any(|origin| origin == "*");

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            ACCEPT,
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(PREFLIGHT_MAX_AGE);

    // Browsers refuse credentials alongside a wildcard origin
    if allow_any {
        layer.allow_origin(AllowOrigin::any())
    } else {
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}
