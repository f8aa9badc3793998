// ABOUTME: Database operations for cookie-tracked anonymous identities
// ABOUTME: Includes the single-transaction transfer of anonymous conversations to an account
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{
    format_timestamp, now, parse_optional_timestamp, parse_optional_uuid, parse_timestamp,
    parse_uuid,
};
use crate::errors::{AppError, AppResult};
use crate::models::AnonymousIdentity;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

/// Anonymous identity database operations
pub struct AnonymousIdentityStore {
    pool: SqlitePool,
}

impl AnonymousIdentityStore {
    /// Create a new identity store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a fresh identity for a newly minted cookie token
    ///
    /// # Errors
    ///
    /// Returns a conflict if a live identity already uses the token, or a
    /// database error if the insert fails
    pub async fn create(&self, token: &str) -> AppResult<AnonymousIdentity> {
        let id = Uuid::new_v4();
        let created_at = now();

        sqlx::query(
            r"
            INSERT INTO anonymous_identities (id, token, created_at, migrated)
            VALUES ($1, $2, $3, 0)
            ",
        )
        .bind(id.to_string())
        .bind(token)
        .bind(format_timestamp(&created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::conflict("Anonymous token already in use")
            }
            other => AppError::database(format!("Failed to create anonymous identity: {other}")),
        })?;

        Ok(AnonymousIdentity {
            id,
            token: token.to_owned(),
            created_at,
            migrated: false,
            migrated_at: None,
            migrated_to: None,
        })
    }

    /// Resolve a cookie token to its live (non-migrated) identity
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn find_active_by_token(&self, token: &str) -> AppResult<Option<AnonymousIdentity>> {
        let row = sqlx::query(
            r"
            SELECT id, token, created_at, migrated, migrated_at, migrated_to
            FROM anonymous_identities
            WHERE token = $1 AND migrated = 0
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up anonymous identity: {e}")))?;

        row.as_ref().map(row_to_identity).transpose()
    }

    /// Get an identity by ID, migrated or not
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get(&self, id: Uuid) -> AppResult<Option<AnonymousIdentity>> {
        let row = sqlx::query(
            r"
            SELECT id, token, created_at, migrated, migrated_at, migrated_to
            FROM anonymous_identities WHERE id = $1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get anonymous identity: {e}")))?;

        row.as_ref().map(row_to_identity).transpose()
    }

    /// Transfer every conversation of an anonymous identity to an account
    ///
    /// Runs as one transaction. The identity is flipped to migrated first,
    /// guarded on it still being live, so a concurrent migration of the same
    /// identity reassigns nothing. Returns the number of conversations moved;
    /// zero when the identity was already migrated or does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction is rolled back
    pub async fn migrate_to_account(&self, anonymous_id: Uuid, account_id: Uuid) -> AppResult<u64> {
        let migrated_at = format_timestamp(&now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin migration: {e}")))?;

        let flipped = sqlx::query(
            r"
            UPDATE anonymous_identities
            SET migrated = 1, migrated_at = $1, migrated_to = $2
            WHERE id = $3 AND migrated = 0
            ",
        )
        .bind(&migrated_at)
        .bind(account_id.to_string())
        .bind(anonymous_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to mark identity migrated: {e}")))?
        .rows_affected();

        if flipped == 0 {
            tx.rollback()
                .await
                .map_err(|e| AppError::database(format!("Failed to roll back migration: {e}")))?;
            debug!(%anonymous_id, "Anonymous identity already migrated or unknown");
            return Ok(0);
        }

        let moved = sqlx::query(
            r"
            UPDATE conversations
            SET account_id = $1, anonymous_id = NULL, updated_at = $2
            WHERE anonymous_id = $3
            ",
        )
        .bind(account_id.to_string())
        .bind(&migrated_at)
        .bind(anonymous_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to reassign conversations: {e}")))?
        .rows_affected();

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit migration: {e}")))?;

        Ok(moved)
    }
}

fn row_to_identity(row: &SqliteRow) -> AppResult<AnonymousIdentity> {
    Ok(AnonymousIdentity {
        id: parse_uuid(row.get("id"))?,
        token: row.get("token"),
        created_at: parse_timestamp(row.get("created_at"))?,
        migrated: row.get::<i64, _>("migrated") != 0,
        migrated_at: parse_optional_timestamp(row.get("migrated_at"))?,
        migrated_to: parse_optional_uuid(row.get("migrated_to"))?,
    })
}
