// ABOUTME: Cookie builders for the anonymous identity and session cookies
// ABOUTME: Also derives the signing key and reads single cookie values from raw headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use atelier_core::constants::cookies;
use axum_extra::extract::cookie::{Cookie, Key, SameSite};
use axum_extra::extract::CookieJar;
use http::HeaderMap;
use sha2::{Digest, Sha512};
use time::Duration;

/// Derive the 64-byte cookie signing key from a secret of any length
#[must_use]
pub fn cookie_key(secret: &[u8]) -> Key {
    let digest = Sha512::digest(secret);
    Key::from(digest.as_slice())
}

/// Long-lived, http-only cookie that carries the anonymous identity token
#[must_use]
pub fn anonymous_identity_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((cookies::ANONYMOUS_ID, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(cookies::ANONYMOUS_ID_MAX_AGE_SECS))
        .build()
}

/// Session cookie that carries the signed JWT
#[must_use]
pub fn auth_token_cookie(token: String, secure: bool, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((cookies::AUTH_TOKEN, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Expired, empty cookie that clears `name`; the path must match the one it was set with
#[must_use]
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").http_only(true).build();
    cookie.make_removal();
    cookie
}

/// Read a single cookie value from request headers
#[must_use]
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}
