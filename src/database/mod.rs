// ABOUTME: SQLite database handle, schema migrations, and shared row conversion helpers
// ABOUTME: Opened once at startup, injected through ServerResources, closed on shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Account persistence
pub mod accounts;
/// Anonymous identity persistence and the transactional migration
pub mod anonymous;
/// Conversation and message persistence
pub mod chat;

pub use accounts::AccountManager;
pub use anonymous::AnonymousIdentityStore;
pub use chat::{AuthorizedConversation, ChatManager};

use crate::errors::{AppError, AppResult};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Database handle shared by all managers
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and apply the schema
    ///
    /// In-memory databases are pinned to a single long-lived connection so
    /// every query sees the same data.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or a
    /// migration statement fails
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let mut connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.migrate().await?;
        info!(in_memory, "Database ready");
        Ok(db)
    }

    /// Create tables and indexes if they do not exist
    ///
    /// # Errors
    ///
    /// Returns an error if any schema statement fails
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Migration failed: {statement}"))?;
        }
        Ok(())
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Account operations
    #[must_use]
    pub fn accounts(&self) -> AccountManager {
        AccountManager::new(self.pool.clone())
    }

    /// Anonymous identity operations
    #[must_use]
    pub fn anonymous_identities(&self) -> AnonymousIdentityStore {
        AnonymousIdentityStore::new(self.pool.clone())
    }

    /// Conversation operations
    #[must_use]
    pub fn chat(&self) -> ChatManager {
        ChatManager::new(self.pool.clone())
    }

    /// Close all connections, waiting for in-flight queries
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS anonymous_identities (
        id TEXT PRIMARY KEY,
        token TEXT NOT NULL,
        created_at TEXT NOT NULL,
        migrated INTEGER NOT NULL DEFAULT 0 CHECK (migrated IN (0, 1)),
        migrated_at TEXT,
        migrated_to TEXT REFERENCES accounts(id)
    )
    ",
    // At most one live identity per cookie token
    r"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_anonymous_identities_active_token
        ON anonymous_identities(token) WHERE migrated = 0
    ",
    r"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT,
        account_id TEXT REFERENCES accounts(id),
        anonymous_id TEXT REFERENCES anonymous_identities(id),
        last_message_at TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK ((account_id IS NULL) <> (anonymous_id IS NULL))
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_conversations_account
        ON conversations(account_id, last_message_at)
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_conversations_anonymous
        ON conversations(anonymous_id, last_message_at)
    ",
    r"
    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        role TEXT NOT NULL CHECK (role IN ('system', 'user', 'assistant')),
        content TEXT NOT NULL,
        model TEXT,
        prompt_tokens INTEGER,
        completion_tokens INTEGER,
        total_tokens INTEGER,
        created_at TEXT NOT NULL
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON messages(conversation_id, created_at, seq)
    ",
];

// ============================================================================
// Row conversion helpers
// ============================================================================

/// Current time at the precision the store persists
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// Fixed-width RFC 3339 so lexical order equals chronological order
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid stored timestamp '{value}': {e}")))
}

pub(crate) fn parse_optional_timestamp(value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    value.map(parse_timestamp).transpose()
}

pub(crate) fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::database(format!("Invalid stored identifier '{value}': {e}")))
}

pub(crate) fn parse_optional_uuid(value: Option<&str>) -> AppResult<Option<Uuid>> {
    value.map(parse_uuid).transpose()
}
