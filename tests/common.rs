// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds in-memory resources with a scripted LLM provider
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `atelier_server`

use anyhow::Result;
use async_trait::async_trait;
use atelier_server::{
    config::ServerConfig,
    database::Database,
    errors::AppError,
    llm::{ChatRequest, ChatResponse, LlmProvider, TokenUsage},
    models::AccountRecord,
    resources::ServerResources,
    routes::build_router,
};
use axum::Router;
use std::sync::{Arc, Mutex, Once};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// LLM provider that answers from a script and records what it was asked
pub struct MockLlmProvider {
    reply: String,
    fail: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmProvider {
    /// Provider that always answers `reply`
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_owned(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider whose every call fails like an unreachable upstream
    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(AppError::external_service("llm", "connection refused"));
        }
        Ok(ChatResponse {
            content: self.reply.clone(),
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model().to_owned()),
            usage: Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 8,
                total_tokens: 20,
            }),
            finish_reason: Some("stop".to_owned()),
        })
    }
}

/// Development configuration with an in-memory database and a cheap bcrypt cost
///
/// Requests in tests have no socket peer, so clients are told apart by
/// `X-Forwarded-For` as they would be behind a proxy.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.database.url = "sqlite::memory:".to_owned();
    config.auth.bcrypt_cost = 4;
    config.rate_limit.trust_proxy_headers = true;
    config
}

/// Standard test database setup
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    Database::new("sqlite::memory:", 1).await
}

/// Everything a route test needs
pub struct TestServer {
    pub resources: Arc<ServerResources>,
    pub llm: Arc<MockLlmProvider>,
}

impl TestServer {
    /// Server with default test configuration
    pub async fn new() -> Self {
        Self::with_config(test_config(), MockLlmProvider::replying("Happy to help!")).await
    }

    /// Server with an explicit configuration and provider
    pub async fn with_config(config: ServerConfig, llm: MockLlmProvider) -> Self {
        let database = create_test_database().await.unwrap();
        let llm = Arc::new(llm);
        let resources = Arc::new(
            ServerResources::with_llm_provider(database, Arc::new(config), llm.clone()).unwrap(),
        );
        Self { resources, llm }
    }

    /// Server whose LLM, payments and scheduling clients make real HTTP calls
    pub async fn with_http_providers(config: ServerConfig) -> Self {
        let database = create_test_database().await.unwrap();
        let resources = Arc::new(ServerResources::new(database, Arc::new(config)).unwrap());
        Self {
            resources,
            llm: Arc::new(MockLlmProvider::replying("")),
        }
    }

    /// Fresh router over the shared resources
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.resources))
    }

    /// Create an account directly in the database
    pub async fn create_account(&self, email: &str) -> AccountRecord {
        self.resources
            .accounts
            .create(email, "not-a-real-hash", None)
            .await
            .unwrap()
    }

    /// `auth_token=<jwt>` cookie pair for an account
    pub fn session_cookie(&self, account: &AccountRecord) -> String {
        let token = self
            .resources
            .auth_manager
            .generate_token(account.id, &account.email)
            .unwrap();
        format!("auth_token={token}")
    }
}
