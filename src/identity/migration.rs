// ABOUTME: Moves an anonymous visitor's conversations to the account they just signed into
// ABOUTME: Runs after credential checks on register and login, before the response is built
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::AnonymousIdentityManager;
use crate::database::AnonymousIdentityStore;
use crate::errors::AppResult;
use crate::security::cookies::removal_cookie;
use atelier_core::constants::cookies;
use axum_extra::extract::cookie::SignedCookieJar;
use tracing::{debug, info};
use uuid::Uuid;

/// Anonymous-to-account migration routine
pub struct SessionMigrator {
    identities: AnonymousIdentityManager,
    store: AnonymousIdentityStore,
}

impl SessionMigrator {
    /// Create a migrator over the identity store
    #[must_use]
    pub const fn new(identities: AnonymousIdentityManager, store: AnonymousIdentityStore) -> Self {
        Self { identities, store }
    }

    /// Transfer the cookie's anonymous history to `account_id`
    ///
    /// Returns the jar to send back and the number of conversations moved.
    /// Without a live identity nothing happens and the jar is unchanged. A
    /// migrated identity is never resolved again, so calling this twice is a
    /// no-op the second time.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer transaction fails; nothing is moved
    pub async fn migrate(
        &self,
        account_id: Uuid,
        jar: SignedCookieJar,
    ) -> AppResult<(SignedCookieJar, u64)> {
        let Some(anonymous_id) = self.identities.lookup(&jar).await? else {
            debug!(%account_id, "No anonymous identity to migrate");
            return Ok((jar, 0));
        };

        let migrated = self.store.migrate_to_account(anonymous_id, account_id).await?;
        info!(
            %anonymous_id,
            %account_id,
            migrated_conversations = migrated,
            "Migrated anonymous history to account"
        );

        Ok((jar.remove(removal_cookie(cookies::ANONYMOUS_ID)), migrated))
    }
}
