// ABOUTME: Centralized resource container injected into every handler and the gateway
// ABOUTME: Built once at startup from configuration and an open database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Resources
//!
//! Holds the shared, expensive objects (database pool, signing keys, HTTP
//! clients, rate-limit state) so handlers never construct their own.

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::database::{AccountManager, ChatManager, Database};
use crate::errors::{AppError, AppResult};
use crate::external::{PaymentsClient, SchedulingClient};
use crate::identity::{AnonymousIdentityManager, SessionMigrator};
use crate::llm::{LlmProvider, OpenAiCompatibleProvider};
use crate::rate_limiting::FixedWindowRateLimiter;
use crate::security::cookies::cookie_key;
use crate::security::{build_content_security_policy, SecurityHeaders};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use http::{HeaderMap, HeaderValue};
use std::sync::Arc;

/// Centralized resource container for dependency injection
pub struct ServerResources {
    /// Database handle, closed on shutdown
    pub database: Database,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Session token issuer and verifier
    pub auth_manager: AuthManager,
    /// Account storage
    pub accounts: AccountManager,
    /// Conversation storage
    pub chat: ChatManager,
    /// Anonymous identity cookies
    pub anonymous_identities: AnonymousIdentityManager,
    /// Anonymous-to-account history transfer
    pub migrator: SessionMigrator,
    /// Request counters
    pub rate_limiter: FixedWindowRateLimiter,
    /// Chat and website generation backend
    pub llm_provider: Arc<dyn LlmProvider>,
    /// Payments provider client
    pub payments: PaymentsClient,
    /// Scheduling provider client
    pub scheduling: SchedulingClient,
    /// Baseline response headers
    pub security_headers: SecurityHeaders,
    /// Content security policy header value
    pub content_security_policy: HeaderValue,
    cookie_key: Key,
}

impl ServerResources {
    /// Build resources with the configured OpenAI-compatible LLM provider
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the content
    /// security policy is not a valid header value
    pub fn new(database: Database, config: Arc<ServerConfig>) -> AppResult<Self> {
        let llm_provider = Arc::new(OpenAiCompatibleProvider::new(
            &config.external.llm,
            config.external.timeout_secs,
        )?);
        Self::with_llm_provider(database, config, llm_provider)
    }

    /// Build resources around an explicit LLM provider
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the content
    /// security policy is not a valid header value
    pub fn with_llm_provider(
        database: Database,
        config: Arc<ServerConfig>,
        llm_provider: Arc<dyn LlmProvider>,
    ) -> AppResult<Self> {
        let secure_cookies = config.environment.is_production();
        let timeout_secs = config.external.timeout_secs;

        let csp = build_content_security_policy(
            &config.security.csp_external_origins,
            config.environment,
        );
        let content_security_policy = HeaderValue::from_str(&csp)
            .map_err(|e| AppError::config(format!("Invalid content security policy: {e}")))?;

        let anonymous_identities = || {
            AnonymousIdentityManager::new(database.anonymous_identities(), secure_cookies)
        };

        Ok(Self {
            auth_manager: AuthManager::new(&config.auth.jwt_secret, config.auth.jwt_expiry_hours),
            accounts: database.accounts(),
            chat: database.chat(),
            anonymous_identities: anonymous_identities(),
            migrator: SessionMigrator::new(anonymous_identities(), database.anonymous_identities()),
            rate_limiter: FixedWindowRateLimiter::new(&config.rate_limit),
            llm_provider,
            payments: PaymentsClient::new(&config.external.payments, timeout_secs)?,
            scheduling: SchedulingClient::new(&config.external.scheduling, timeout_secs)?,
            security_headers: SecurityHeaders::for_environment(config.environment),
            content_security_policy,
            cookie_key: cookie_key(&config.auth.cookie_secret),
            database,
            config,
        })
    }

    /// Signed cookie jar for a request
    #[must_use]
    pub fn cookie_jar(&self, headers: &HeaderMap) -> SignedCookieJar {
        SignedCookieJar::from_headers(headers, self.cookie_key.clone())
    }

    /// Whether cookies are marked `Secure`
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.config.environment.is_production()
    }
}
