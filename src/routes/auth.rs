// ABOUTME: Authentication route handlers: register, login, logout, demo access, current account
// ABOUTME: Successful register and login hand the visitor's anonymous history to the account
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Authentication routes
//!
//! Sessions are issued as an http-only `auth_token` cookie. Register and
//! login run the anonymous-to-account migration after the credentials are
//! verified and before the response is built, and report how many
//! conversations moved.

use super::JsonBody;
use crate::auth::{hash_password, verify_password};
use crate::errors::{AppError, AppResult};
use crate::middleware::CurrentAccount;
use crate::models::{AccountRecord, AccountSummary};
use crate::resources::ServerResources;
use crate::security::cookies::{auth_token_cookie, removal_cookie};
use atelier_core::constants::cookies::AUTH_TOKEN;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Shortest accepted password
const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/auth/register`
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Plain-text password
    #[serde(default)]
    pub password: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `POST /api/auth/login`
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Plain-text password
    #[serde(default)]
    pub password: Option<String>,
}

/// Body of `POST /api/auth/demo-access`
#[derive(Debug, Deserialize)]
pub struct DemoAccessRequest {
    /// Shared demo access code
    #[serde(default)]
    pub code: Option<String>,
}

/// Reply to register and login
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// The signed-in account
    pub account: AccountSummary,
    /// Conversations moved from the anonymous identity
    pub migrated_conversations: u64,
}

// ============================================================================
// Validation
// ============================================================================

/// Loose structural email check; delivery is the real test
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
}

/// Minimum password strength
#[must_use]
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

fn required<'a>(value: Option<&'a str>, missing: &mut Vec<&'static str>, name: &'static str) -> &'a str {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value,
        None => {
            missing.push(name);
            ""
        }
    }
}

// ============================================================================
// Auth Routes
// ============================================================================

/// Authentication routes handler
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/register", post(Self::register))
            .route("/api/auth/login", post(Self::login))
            .route("/api/auth/logout", post(Self::logout))
            .route("/api/auth/demo-access", post(Self::demo_access))
            .route("/api/auth/me", get(Self::me))
            .with_state(resources)
    }

    /// Cookie jar carrying a fresh session token for `account`
    fn session_cookie(resources: &ServerResources, account: &AccountRecord) -> AppResult<CookieJar> {
        let token = resources
            .auth_manager
            .generate_token(account.id, &account.email)?;
        let max_age_secs = resources.auth_manager.token_expiry_hours() * 60 * 60;
        Ok(CookieJar::new().add(auth_token_cookie(
            token,
            resources.secure_cookies(),
            max_age_secs,
        )))
    }

    /// Create an account, sign it in, and adopt the visitor's anonymous history
    async fn register(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(request): JsonBody<RegisterRequest>,
    ) -> Result<Response, AppError> {
        let mut missing = Vec::new();
        let email = required(request.email.as_deref(), &mut missing, "email");
        let password = required(request.password.as_deref(), &mut missing, "password");
        if !missing.is_empty() {
            return Err(AppError::missing_fields(&missing));
        }
        if !is_valid_email(email) {
            return Err(AppError::invalid_input("Invalid email format"));
        }
        if !is_valid_password(password) {
            return Err(AppError::invalid_input(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if resources.accounts.get_by_email(email).await?.is_some() {
            return Err(AppError::conflict("An account with this email already exists"));
        }

        let password_hash =
            hash_password(password.to_owned(), resources.config.auth.bcrypt_cost).await?;
        let display_name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let account = resources
            .accounts
            .create(email, &password_hash, display_name)
            .await?;

        let session = Self::session_cookie(&resources, &account)?;
        let (identity_jar, migrated_conversations) = resources
            .migrator
            .migrate(account.id, resources.cookie_jar(&headers))
            .await?;

        info!(account_id = %account.id, migrated_conversations, "Account registered");
        let body = AuthResponse {
            account: account.summary(),
            migrated_conversations,
        };
        Ok((StatusCode::CREATED, session, identity_jar, Json(body)).into_response())
    }

    /// Verify credentials, sign in, and adopt the visitor's anonymous history
    async fn login(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(request): JsonBody<LoginRequest>,
    ) -> Result<Response, AppError> {
        let mut missing = Vec::new();
        let email = required(request.email.as_deref(), &mut missing, "email");
        let password = required(request.password.as_deref(), &mut missing, "password");
        if !missing.is_empty() {
            return Err(AppError::missing_fields(&missing));
        }

        let invalid = || AppError::auth_invalid("Invalid email or password");
        let account = resources
            .accounts
            .get_by_email(email)
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(password.to_owned(), account.password_hash.clone()).await? {
            warn!(account_id = %account.id, "Login rejected: wrong password");
            return Err(invalid());
        }

        let session = Self::session_cookie(&resources, &account)?;
        let (identity_jar, migrated_conversations) = resources
            .migrator
            .migrate(account.id, resources.cookie_jar(&headers))
            .await?;

        info!(account_id = %account.id, migrated_conversations, "Account logged in");
        let body = AuthResponse {
            account: account.summary(),
            migrated_conversations,
        };
        Ok((session, identity_jar, Json(body)).into_response())
    }

    /// Clear the session cookie
    async fn logout() -> Response {
        let jar = CookieJar::new().add(removal_cookie(AUTH_TOKEN));
        (jar, Json(json!({ "success": true }))).into_response()
    }

    /// Sign into the shared demo account with an access code
    async fn demo_access(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(request): JsonBody<DemoAccessRequest>,
    ) -> Result<Response, AppError> {
        let expected = resources
            .config
            .auth
            .demo_access_code
            .as_deref()
            .ok_or_else(|| AppError::not_found("Demo access"))?;
        let code = request
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AppError::missing_fields(&["code"]))?;

        if !bool::from(code.as_bytes().ct_eq(expected.as_bytes())) {
            warn!("Demo access rejected: wrong code");
            return Err(AppError::auth_invalid("Invalid access code"));
        }

        let account = Self::demo_account(&resources).await?;
        let session = Self::session_cookie(&resources, &account)?;
        info!(account_id = %account.id, "Demo access granted");
        Ok((session, Json(json!({ "account": account.summary() }))).into_response())
    }

    /// The demo account, created on first use with an unguessable password
    async fn demo_account(resources: &ServerResources) -> AppResult<AccountRecord> {
        let email = &resources.config.auth.demo_account_email;
        if let Some(account) = resources.accounts.get_by_email(email).await? {
            return Ok(account);
        }

        let mut secret = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        let password_hash = hash_password(
            URL_SAFE_NO_PAD.encode(secret),
            resources.config.auth.bcrypt_cost,
        )
        .await?;

        match resources
            .accounts
            .create(email, &password_hash, Some("Demo"))
            .await
        {
            Ok(account) => Ok(account),
            // Another request created it first
            Err(e) if e.http_status() == 409 => resources
                .accounts
                .get_by_email(email)
                .await?
                .ok_or_else(|| AppError::internal("Demo account vanished after conflict")),
            Err(e) => Err(e),
        }
    }

    /// The signed-in account
    async fn me(
        State(resources): State<Arc<ServerResources>>,
        current: CurrentAccount,
    ) -> Result<Response, AppError> {
        let account = resources
            .accounts
            .get_by_id(current.account_id)
            .await?
            .ok_or_else(|| AppError::not_found("Account"))?;
        Ok(Json(account.summary()).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@studio.co.uk"));
        assert!(!is_valid_email("ada"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada@.com"));
        assert!(!is_valid_email("ada @example.com"));
    }

    #[test]
    fn test_password_validation() {
        assert!(is_valid_password("correct horse"));
        assert!(!is_valid_password("short"));
    }

    #[test]
    fn test_required_collects_missing_fields() {
        let mut missing = Vec::new();
        assert_eq!(required(Some(" a "), &mut missing, "email"), "a");
        assert_eq!(required(Some("   "), &mut missing, "password"), "");
        assert_eq!(required(None, &mut missing, "name"), "");
        assert_eq!(missing, vec!["password", "name"]);
    }
}
