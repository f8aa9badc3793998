// ABOUTME: Main library entry point for the Atelier web server
// ABOUTME: Session continuity, request gating and the HTTP API for chat, auth, payments and scheduling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Atelier Server
//!
//! Backend for a small-business website builder with an LLM chat assistant.
//!
//! ## Features
//!
//! - **Anonymous continuity**: visitors chat before signing up; a signed
//!   cookie ties their conversations together
//! - **Migration**: registering or logging in adopts the anonymous history
//! - **Request gateway**: fixed-window rate limiting, session checks,
//!   security headers and CORS in one middleware
//! - **Integrations**: OpenAI-compatible LLM, Stripe payments, Calendly slots
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use atelier_server::config::ServerConfig;
//! use atelier_server::database::Database;
//! use atelier_server::resources::ServerResources;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let database = Database::new(&config.database.url, config.database.max_connections).await?;
//!     let resources = Arc::new(ServerResources::new(database, Arc::new(config))?);
//!     atelier_server::server::serve(resources).await
//! }
//! ```

/// JWT session issuance and verification, password hashing
pub mod auth;

/// Environment-driven configuration
pub mod config;

/// SQLite persistence for accounts, identities and conversations
pub mod database;

/// Payments and scheduling provider clients
pub mod external;

/// Anonymous identities and their migration to accounts
pub mod identity;

/// LLM provider abstraction and prompts
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Request gateway, extractors, CORS and tracing
pub mod middleware;

/// Fixed-window rate limiter
pub mod rate_limiting;

/// Shared server resources
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Cookies and security headers
pub mod security;

/// Server lifecycle
pub mod server;

pub use atelier_core::{constants, errors, models};
