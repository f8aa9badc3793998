// ABOUTME: Conversion from sqlx errors into the unified application error
// ABOUTME: Unique constraint violations surface as conflicts, the rest as database errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::AppError;

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => Self::not_found("Record"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::conflict(format!("Unique constraint violated: {}", db.message()))
            }
            _ => Self::database(format!("Database operation failed: {error}")),
        }
        .with_source(error)
    }
}
