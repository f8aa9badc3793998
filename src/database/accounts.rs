// ABOUTME: Database operations for durable accounts keyed by normalized email
// ABOUTME: Duplicate emails surface as conflicts, never as generic database failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{format_timestamp, now, parse_timestamp, parse_uuid};
use crate::errors::{AppError, AppResult};
use crate::models::AccountRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Account database operations manager
pub struct AccountManager {
    pool: SqlitePool,
}

impl AccountManager {
    /// Create a new account manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an account
    ///
    /// # Errors
    ///
    /// Returns a conflict if the email is already registered, or a database
    /// error if the insert fails
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> AppResult<AccountRecord> {
        let id = Uuid::new_v4();
        let email = AccountRecord::normalize_email(email);
        let created_at = now();
        let timestamp = format_timestamp(&created_at);

        sqlx::query(
            r"
            INSERT INTO accounts (id, email, display_name, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ",
        )
        .bind(id.to_string())
        .bind(&email)
        .bind(display_name)
        .bind(password_hash)
        .bind(&timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::conflict("An account with this email already exists")
            }
            other => AppError::database(format!("Failed to create account: {other}")),
        })?;

        Ok(AccountRecord {
            id,
            email,
            display_name: display_name.map(ToOwned::to_owned),
            password_hash: password_hash.to_owned(),
            created_at,
            updated_at: created_at,
        })
    }

    /// Look up an account by email (normalized before lookup)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<AccountRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, password_hash, created_at, updated_at
            FROM accounts WHERE email = $1
            ",
        )
        .bind(AccountRecord::normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get account by email: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Look up an account by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<AccountRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, email, display_name, password_hash, created_at, updated_at
            FROM accounts WHERE id = $1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get account: {e}")))?;

        row.as_ref().map(row_to_account).transpose()
    }
}

fn row_to_account(row: &SqliteRow) -> AppResult<AccountRecord> {
    Ok(AccountRecord {
        id: parse_uuid(row.get("id"))?,
        email: row.get("email"),
        display_name: row.get("display_name"),
        password_hash: row.get("password_hash"),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}
