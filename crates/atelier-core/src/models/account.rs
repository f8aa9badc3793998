// ABOUTME: Durable account records keyed by a unique, normalized email address
// ABOUTME: The public summary type never carries the credential hash
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Database representation of an account
#[derive(Debug, Clone)]
pub struct AccountRecord {
    /// Account ID
    pub id: Uuid,
    /// Lower-cased, trimmed email address
    pub email: String,
    /// Optional display name
    pub display_name: Option<String>,
    /// bcrypt hash of the password
    pub password_hash: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl AccountRecord {
    /// Normalize an email for storage and lookup
    #[must_use]
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Client-facing view of this account
    #[must_use]
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            created_at: self.created_at,
        }
    }
}

/// Account as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// Account ID
    pub id: Uuid,
    /// Email address
    pub email: String,
    /// Optional display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}
