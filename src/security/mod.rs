// ABOUTME: Security primitives for cookies and browser-facing response headers
// ABOUTME: Cookie builders and baseline header policy shared by the gateway and handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Cookie construction, parsing, and signing key derivation
pub mod cookies;

/// Baseline security headers and content security policy
pub mod headers;

pub use headers::{build_content_security_policy, SecurityHeaders};
