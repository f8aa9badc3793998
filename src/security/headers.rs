// ABOUTME: Baseline security headers applied to every response and the CSP builder
// ABOUTME: HSTS is only emitted in production where the site is served over HTTPS
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Security Headers
//!
//! Protects against clickjacking, MIME sniffing, and reflected XSS, and
//! restricts which third-party origins the browser may talk to.

use crate::config::Environment;
use http::header::{
    HeaderName, CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use http::{HeaderMap, HeaderValue};

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Security headers configuration
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    /// X-Frame-Options header value
    pub frame_options: HeaderValue,
    /// X-Content-Type-Options header value
    pub content_type_options: HeaderValue,
    /// X-XSS-Protection header value
    pub xss_protection: HeaderValue,
    /// Referrer-Policy header value
    pub referrer_policy: HeaderValue,
    /// Permissions-Policy header value
    pub permissions_policy: HeaderValue,
    /// Strict-Transport-Security header value (for HTTPS)
    pub hsts: Option<HeaderValue>,
}

impl SecurityHeaders {
    /// Header set for an environment
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            frame_options: HeaderValue::from_static("DENY"),
            content_type_options: HeaderValue::from_static("nosniff"),
            xss_protection: HeaderValue::from_static("1; mode=block"),
            referrer_policy: HeaderValue::from_static("strict-origin-when-cross-origin"),
            // Payments run inside the provider's iframe on our origin
            permissions_policy: HeaderValue::from_static(
                "camera=(), microphone=(), geolocation=(), usb=(), payment=(self)",
            ),
            hsts: environment
                .is_production()
                .then(|| HeaderValue::from_static("max-age=31536000; includeSubDomains")),
        }
    }

    /// Insert the baseline headers, leaving values a handler already set
    pub fn apply(&self, headers: &mut HeaderMap) {
        let pairs = [
            (X_FRAME_OPTIONS, &self.frame_options),
            (X_CONTENT_TYPE_OPTIONS, &self.content_type_options),
            (X_XSS_PROTECTION, &self.xss_protection),
            (REFERRER_POLICY, &self.referrer_policy),
            (PERMISSIONS_POLICY, &self.permissions_policy),
        ];
        for (name, value) in pairs {
            headers.entry(name).or_insert_with(|| value.clone());
        }
        if let Some(hsts) = &self.hsts {
            headers
                .entry(STRICT_TRANSPORT_SECURITY)
                .or_insert_with(|| hsts.clone());
        }
    }
}

/// Content security policy allowing `'self'` plus the configured API origins
#[must_use]
pub fn build_content_security_policy(external_origins: &[String], environment: Environment) -> String {
    let origins = external_origins.join(" ");
    let connect_extra = if environment.is_production() {
        ""
    } else {
        " http://localhost:* ws://localhost:*"
    };
    format!(
        "default-src 'self'; \
         script-src 'self' 'unsafe-inline' {origins}; \
         style-src 'self' 'unsafe-inline'; \
         img-src 'self' data: https:; \
         font-src 'self' data:; \
         connect-src 'self' {origins}{connect_extra}; \
         frame-src 'self' {origins}; \
         frame-ancestors 'none'; \
         object-src 'none'; \
         base-uri 'self'"
    )
}

/// Insert the CSP header unless the handler already chose one
pub fn apply_content_security_policy(headers: &mut HeaderMap, policy: &HeaderValue) {
    headers
        .entry(CONTENT_SECURITY_POLICY)
        .or_insert_with(|| policy.clone());
}
