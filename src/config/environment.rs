// ABOUTME: Environment-based server configuration for ports, storage, auth, limits, and providers
// ABOUTME: Loads .env via dotenvy, parses typed values, and renders a secret-free summary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use anyhow::{bail, Context, Result};
use atelier_core::constants::{jwt, rate_limits, routes};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use tracing::{info, warn};
use url::Url;

/// Default CSP origins for the third-party APIs the site talks to
const DEFAULT_CSP_EXTERNAL_ORIGINS: &str = "https://api.openai.com,https://api.stripe.com,https://js.stripe.com,https://calendly.com,https://assets.calendly.com";

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Deployed production
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Database settings
    pub database: DatabaseConfig,
    /// Session and credential settings
    pub auth: AuthConfig,
    /// Fixed-window rate limiting
    pub rate_limit: RateLimitConfig,
    /// CORS and CSP settings
    pub security: SecurityConfig,
    /// Which routes require or reject a session
    pub routes: RoutePolicy,
    /// Third-party providers
    pub external: ExternalServicesConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL
    pub url: String,
    /// Pool size
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for session tokens
    pub jwt_secret: Vec<u8>,
    /// Session token lifetime
    pub jwt_expiry_hours: i64,
    /// Secret used to sign the anonymous identity cookie
    pub cookie_secret: Vec<u8>,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    /// Shared code that unlocks the demo account
    pub demo_access_code: Option<String>,
    /// Account used for demo access
    pub demo_account_email: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("cookie_secret", &"[REDACTED]")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("demo_access_code", &self.demo_access_code.as_ref().map(|_| "[REDACTED]"))
            .field("demo_account_email", &self.demo_account_email)
            .finish()
    }
}

/// A per-route ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLimit {
    /// Path prefix, matched on segment boundaries
    pub prefix: String,
    /// Requests allowed per window
    pub limit: u32,
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Window length in seconds
    pub window_secs: u64,
    /// Ceiling for API routes without an override
    pub default_limit: u32,
    /// Per-route overrides
    pub route_limits: Vec<RouteLimit>,
    /// Upper bound on tracked counters
    pub max_tracked_clients: usize,
    /// Key clients by `X-Forwarded-For`/`X-Real-IP` instead of the socket peer
    pub trust_proxy_headers: bool,
}

/// CORS and CSP configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// Third-party origins added to the content security policy
    pub csp_external_origins: Vec<String>,
}

/// Route classification used by the request gateway
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// API prefixes that require a verified session
    pub protected_api_prefixes: Vec<String>,
    /// Page prefixes that require a verified session
    pub protected_page_prefixes: Vec<String>,
    /// Pages that redirect away when a session is present
    pub auth_only_pages: Vec<String>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect();
        Self {
            protected_api_prefixes: owned(routes::PROTECTED_API_PREFIXES),
            protected_page_prefixes: owned(routes::PROTECTED_PAGE_PREFIXES),
            auth_only_pages: owned(routes::AUTH_ONLY_PAGES),
        }
    }
}

/// Third-party provider configuration
#[derive(Debug, Clone)]
pub struct ExternalServicesConfig {
    /// Timeout applied to every provider call
    pub timeout_secs: u64,
    /// LLM provider
    pub llm: LlmConfig,
    /// Payments provider
    pub payments: PaymentsConfig,
    /// Scheduling provider
    pub scheduling: SchedulingConfig,
}

/// OpenAI-compatible LLM provider
#[derive(Clone)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// API key
    pub api_key: Option<String>,
    /// Default model
    pub model: String,
}

/// Payments provider (Stripe)
#[derive(Clone)]
pub struct PaymentsConfig {
    /// Secret key
    pub secret_key: Option<String>,
    /// API base URL
    pub base_url: String,
}

/// Scheduling provider (Calendly)
#[derive(Clone)]
pub struct SchedulingConfig {
    /// Personal access token
    pub api_token: Option<String>,
    /// Event type URI whose availability is queried
    pub event_type: Option<String>,
    /// API base URL
    pub base_url: String,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish()
    }
}

impl fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for SchedulingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("event_type", &self.event_type)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for ServerConfig {
    /// Development defaults with per-process random secrets
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            http_port: 8081,
            environment: Environment::Development,
            database: DatabaseConfig {
                url: "sqlite:./data/atelier.db".into(),
                max_connections: 5,
            },
            auth: AuthConfig {
                jwt_secret: random_secret(),
                jwt_expiry_hours: jwt::DEFAULT_EXPIRY_HOURS,
                cookie_secret: random_secret(),
                bcrypt_cost: bcrypt::DEFAULT_COST,
                demo_access_code: None,
                demo_account_email: "demo@atelier.local".into(),
            },
            rate_limit: RateLimitConfig {
                window_secs: rate_limits::DEFAULT_WINDOW_SECS,
                default_limit: rate_limits::DEFAULT_LIMIT,
                route_limits: parse_route_limits(rate_limits::DEFAULT_ROUTE_LIMITS)
                    .unwrap_or_default(),
                max_tracked_clients: rate_limits::DEFAULT_MAX_TRACKED_CLIENTS,
                trust_proxy_headers: false,
            },
            security: SecurityConfig {
                cors_origins: vec!["*".into()],
                csp_external_origins: parse_origins(DEFAULT_CSP_EXTERNAL_ORIGINS),
            },
            routes: RoutePolicy::default(),
            external: ExternalServicesConfig {
                timeout_secs: 30,
                llm: LlmConfig {
                    base_url: "https://api.openai.com/v1".into(),
                    api_key: None,
                    model: "gpt-4o-mini".into(),
                },
                payments: PaymentsConfig {
                    secret_key: None,
                    base_url: "https://api.stripe.com".into(),
                },
                scheduling: SchedulingConfig {
                    api_token: None,
                    event_type: None,
                    base_url: "https://api.calendly.com".into(),
                },
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a value fails to parse, or if production is
    /// selected without `JWT_SECRET` and `COOKIE_SECRET`.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {e}");
        }

        let defaults = Self::default();
        let environment = Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development"));

        let config = Self {
            host: env_var_or("HTTP_HOST", &defaults.host),
            http_port: env_var_or("HTTP_PORT", &defaults.http_port.to_string())
                .parse()
                .context("Invalid HTTP_PORT value")?,
            environment,

            database: DatabaseConfig {
                url: env_var_or("DATABASE_URL", &defaults.database.url),
                max_connections: env_var_or(
                    "DATABASE_MAX_CONNECTIONS",
                    &defaults.database.max_connections.to_string(),
                )
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS value")?,
            },

            auth: AuthConfig {
                jwt_secret: secret_from_env("JWT_SECRET", environment)?,
                jwt_expiry_hours: env_var_or(
                    "JWT_EXPIRY_HOURS",
                    &defaults.auth.jwt_expiry_hours.to_string(),
                )
                .parse()
                .context("Invalid JWT_EXPIRY_HOURS value")?,
                cookie_secret: secret_from_env("COOKIE_SECRET", environment)?,
                bcrypt_cost: env_var_or("BCRYPT_COST", &defaults.auth.bcrypt_cost.to_string())
                    .parse()
                    .context("Invalid BCRYPT_COST value")?,
                demo_access_code: env::var("DEMO_ACCESS_CODE")
                    .ok()
                    .filter(|s| !s.is_empty()),
                demo_account_email: env_var_or(
                    "DEMO_ACCOUNT_EMAIL",
                    &defaults.auth.demo_account_email,
                ),
            },

            rate_limit: RateLimitConfig {
                window_secs: env_var_or(
                    "RATE_LIMIT_WINDOW_SECS",
                    &rate_limits::DEFAULT_WINDOW_SECS.to_string(),
                )
                .parse()
                .context("Invalid RATE_LIMIT_WINDOW_SECS value")?,
                default_limit: env_var_or(
                    "RATE_LIMIT_DEFAULT",
                    &rate_limits::DEFAULT_LIMIT.to_string(),
                )
                .parse()
                .context("Invalid RATE_LIMIT_DEFAULT value")?,
                route_limits: parse_route_limits(&env_var_or(
                    "RATE_LIMIT_ROUTES",
                    rate_limits::DEFAULT_ROUTE_LIMITS,
                ))?,
                max_tracked_clients: env_var_or(
                    "RATE_LIMIT_MAX_CLIENTS",
                    &rate_limits::DEFAULT_MAX_TRACKED_CLIENTS.to_string(),
                )
                .parse()
                .context("Invalid RATE_LIMIT_MAX_CLIENTS value")?,
                trust_proxy_headers: parse_flag(&env_var_or("TRUST_PROXY_HEADERS", "false"))
                    .context("Invalid TRUST_PROXY_HEADERS value")?,
            },

            security: SecurityConfig {
                cors_origins: parse_origins(&env_var_or("CORS_ALLOWED_ORIGINS", "*")),
                csp_external_origins: parse_origins(&env_var_or(
                    "CSP_EXTERNAL_ORIGINS",
                    DEFAULT_CSP_EXTERNAL_ORIGINS,
                )),
            },

            routes: RoutePolicy::default(),

            external: ExternalServicesConfig {
                timeout_secs: env_var_or(
                    "PROVIDER_TIMEOUT_SECS",
                    &defaults.external.timeout_secs.to_string(),
                )
                .parse()
                .context("Invalid PROVIDER_TIMEOUT_SECS value")?,
                llm: LlmConfig {
                    base_url: env_var_or("OPENAI_BASE_URL", &defaults.external.llm.base_url),
                    api_key: optional_env("OPENAI_API_KEY"),
                    model: env_var_or("OPENAI_MODEL", &defaults.external.llm.model),
                },
                payments: PaymentsConfig {
                    secret_key: optional_env("STRIPE_SECRET_KEY"),
                    base_url: env_var_or("STRIPE_BASE_URL", &defaults.external.payments.base_url),
                },
                scheduling: SchedulingConfig {
                    api_token: optional_env("CALENDLY_API_TOKEN"),
                    event_type: optional_env("CALENDLY_EVENT_TYPE"),
                    base_url: env_var_or(
                        "CALENDLY_BASE_URL",
                        &defaults.external.scheduling.base_url,
                    ),
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error for values that would make the server misbehave
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_secs == 0 {
            bail!("RATE_LIMIT_WINDOW_SECS must be greater than zero");
        }
        if self.external.timeout_secs == 0 {
            bail!("PROVIDER_TIMEOUT_SECS must be greater than zero");
        }
        if self.auth.jwt_expiry_hours <= 0 {
            bail!("JWT_EXPIRY_HOURS must be greater than zero");
        }
        for (key, base_url) in [
            ("OPENAI_BASE_URL", &self.external.llm.base_url),
            ("STRIPE_BASE_URL", &self.external.payments.base_url),
            ("CALENDLY_BASE_URL", &self.external.scheduling.base_url),
        ] {
            let parsed = Url::parse(base_url).with_context(|| format!("{key} is not a valid URL"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("{key} must use http or https");
            }
        }
        if self.environment.is_production() && self.security.cors_origins.iter().any(|o| o == "*") {
            warn!("CORS allows any origin in production");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        let enabled = |on: bool| if on { "Enabled" } else { "Disabled" };
        format!(
            "Atelier Server Configuration:\n\
             - Address: {}:{}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Session lifetime: {}h\n\
             - Rate Limiting: {} req/{}s default, {} route overrides, proxy headers {}\n\
             - CORS origins: {}\n\
             - Provider timeout: {}s\n\
             - LLM: {} ({})\n\
             - Payments: {}\n\
             - Scheduling: {}\n\
             - Demo access: {}",
            self.host,
            self.http_port,
            self.environment,
            redact_database_url(&self.database.url),
            self.auth.jwt_expiry_hours,
            self.rate_limit.default_limit,
            self.rate_limit.window_secs,
            self.rate_limit.route_limits.len(),
            if self.rate_limit.trust_proxy_headers { "trusted" } else { "ignored" },
            self.security.cors_origins.join(", "),
            self.external.timeout_secs,
            enabled(self.external.llm.api_key.is_some()),
            self.external.llm.model,
            enabled(self.external.payments.secret_key.is_some()),
            enabled(
                self.external.scheduling.api_token.is_some()
                    && self.external.scheduling.event_type.is_some()
            ),
            enabled(self.auth.demo_access_code.is_some()),
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse a boolean environment value
fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}

/// Non-empty environment variable
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0_u8; 64];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Secret from the environment; outside production a random one is generated
fn secret_from_env(key: &str, environment: Environment) -> Result<Vec<u8>> {
    match optional_env(key) {
        Some(secret) => Ok(secret.into_bytes()),
        None if environment.is_production() => {
            bail!("{key} must be set in production")
        }
        None => {
            warn!("{key} not set, generated an ephemeral secret; sessions will not survive restarts");
            Ok(random_secret())
        }
    }
}

/// Parse comma-separated origins
pub(crate) fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Parse `prefix=limit` pairs separated by commas
///
/// # Errors
///
/// Returns an error naming the first malformed entry
pub fn parse_route_limits(spec: &str) -> Result<Vec<RouteLimit>> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (prefix, limit) = entry
                .split_once('=')
                .with_context(|| format!("Invalid RATE_LIMIT_ROUTES entry '{entry}'"))?;
            let prefix = prefix.trim();
            if !prefix.starts_with('/') {
                bail!("Route prefix '{prefix}' must start with '/'");
            }
            Ok(RouteLimit {
                prefix: prefix.trim_end_matches('/').to_owned(),
                limit: limit
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid limit in RATE_LIMIT_ROUTES entry '{entry}'"))?,
            })
        })
        .collect()
}

fn redact_database_url(url: &str) -> String {
    url.split_once('@').map_or_else(
        || url.to_owned(),
        |(_, host)| format!("***@{host}"),
    )
}
