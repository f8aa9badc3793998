// ABOUTME: Resolves or mints the anonymous identity carried in the signed anon_id cookie
// ABOUTME: Missing or tampered cookies mean "no identity", never an error
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::database::AnonymousIdentityStore;
use crate::errors::AppResult;
use crate::security::cookies::anonymous_identity_cookie;
use atelier_core::constants::cookies;
use axum_extra::extract::cookie::SignedCookieJar;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use tracing::{debug, info};
use uuid::Uuid;

/// Issues and resolves anonymous identities
pub struct AnonymousIdentityManager {
    store: AnonymousIdentityStore,
    secure_cookies: bool,
}

impl AnonymousIdentityManager {
    /// Create a manager; `secure_cookies` marks the cookie `Secure`
    #[must_use]
    pub const fn new(store: AnonymousIdentityStore, secure_cookies: bool) -> Self {
        Self {
            store,
            secure_cookies,
        }
    }

    /// Return the caller's live identity, minting one if needed
    ///
    /// The jar comes back unchanged when the cookie already resolves; otherwise
    /// it carries a fresh identity cookie that the handler must return.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity table cannot be read or written
    pub async fn ensure(&self, jar: SignedCookieJar) -> AppResult<(SignedCookieJar, Uuid)> {
        if let Some(id) = self.lookup(&jar).await? {
            return Ok((jar, id));
        }

        let token = generate_token();
        let identity = self.store.create(&token).await?;
        info!(anonymous_id = %identity.id, "Issued anonymous identity");

        let jar = jar.add(anonymous_identity_cookie(token, self.secure_cookies));
        Ok((jar, identity.id))
    }

    /// Resolve the identity in the cookie without creating anything
    ///
    /// # Errors
    ///
    /// Returns an error if the identity table cannot be read
    pub async fn lookup(&self, jar: &SignedCookieJar) -> AppResult<Option<Uuid>> {
        let Some(cookie) = jar.get(cookies::ANONYMOUS_ID) else {
            return Ok(None);
        };
        let token = cookie.value();
        if token.is_empty() {
            return Ok(None);
        }

        let identity = self.store.find_active_by_token(token).await?;
        if identity.is_none() {
            debug!("Anonymous cookie does not map to a live identity");
        }
        Ok(identity.map(|identity| identity.id))
    }
}

fn generate_token() -> String {
    let mut bytes = [0_u8; cookies::ANONYMOUS_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
