// ABOUTME: Application constants for cookies, token lifetimes, and route policy defaults
// ABOUTME: Shared by the server crate and its tests so both agree on wire-level names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Cookie names and lifetimes
pub mod cookies {
    /// Signed cookie carrying the anonymous identity token
    pub const ANONYMOUS_ID: &str = "anon_id";

    /// Cookie carrying the signed session JWT
    pub const AUTH_TOKEN: &str = "auth_token";

    /// Anonymous identity cookie lifetime (one year)
    pub const ANONYMOUS_ID_MAX_AGE_SECS: i64 = 365 * 24 * 60 * 60;

    /// Session cookie lifetime (24 hours)
    pub const AUTH_TOKEN_MAX_AGE_SECS: i64 = 24 * 60 * 60;

    /// Random bytes in a freshly minted anonymous token
    pub const ANONYMOUS_TOKEN_BYTES: usize = 32;
}

/// JWT settings
pub mod jwt {
    /// Audience claim stamped on and required from every session token
    pub const AUDIENCE: &str = "atelier-web";

    /// Default token lifetime in hours
    pub const DEFAULT_EXPIRY_HOURS: i64 = 24;
}

/// Route policy defaults used by the request gateway
pub mod routes {
    /// Prefix that identifies API routes
    pub const API_PREFIX: &str = "/api";

    /// API prefixes that require a verified session
    pub const PROTECTED_API_PREFIXES: &[&str] =
        &["/api/auth/me", "/api/payments", "/api/generate-website"];

    /// Page prefixes that require a verified session
    pub const PROTECTED_PAGE_PREFIXES: &[&str] = &["/dashboard"];

    /// Pages that only make sense without a session
    pub const AUTH_ONLY_PAGES: &[&str] = &["/login", "/register"];

    /// Login page used for redirects
    pub const LOGIN_PAGE: &str = "/login";

    /// Landing page for authenticated users
    pub const DASHBOARD_PAGE: &str = "/dashboard";

    /// Query parameter carrying the original destination on login redirects
    pub const RETURN_TO_PARAM: &str = "returnTo";
}

/// Rate limiting defaults
pub mod rate_limits {
    /// Fixed window length in seconds
    pub const DEFAULT_WINDOW_SECS: u64 = 60;

    /// Ceiling for API routes without a specific override
    pub const DEFAULT_LIMIT: u32 = 100;

    /// Per-route ceilings, longest matching prefix wins
    pub const DEFAULT_ROUTE_LIMITS: &str =
        "/api/chat=20,/api/auth=10,/api/generate-website=5,/api/payments=10";

    /// Maximum number of tracked (client, route) counters
    pub const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;

    /// Route family used for API paths without a configured prefix
    pub const FALLBACK_ROUTE: &str = "*";

    /// Client key used when no address can be determined
    pub const UNKNOWN_CLIENT: &str = "unknown";
}

/// Service names used in logs and external metadata
pub mod service_names {
    /// Server binary name
    pub const ATELIER_SERVER: &str = "atelier-server";

    /// LLM provider label
    pub const LLM: &str = "llm";

    /// Payments provider label
    pub const PAYMENTS: &str = "payments";

    /// Scheduling provider label
    pub const SCHEDULING: &str = "scheduling";
}
