// ABOUTME: HTTP middleware for request gating, tracing, CORS, and session extraction
// ABOUTME: Gateways apply security headers, rate limits, and route guards in order
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Session extractors
pub mod auth;
/// CORS layer for API routes
pub mod cors;
/// Per-request gate in front of every handler
pub mod gateway;
/// Rate limit headers and client address resolution
pub mod rate_limiting;
/// Request spans
pub mod tracing;

// Session extractors
pub use auth::{CurrentAccount, MaybeAccount};

// CORS configuration
pub use cors::setup_cors;

// Request gateway
pub use gateway::{api_gateway, request_gateway};

// Rate limiting middleware and utilities
pub use rate_limiting::{
    client_address, create_rate_limit_headers, create_rate_limit_response, headers,
};

// Request tracing
pub use tracing::{create_request_span, trace_layer, RequestSpan, REQUEST_ID_HEADER};
