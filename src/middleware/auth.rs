// ABOUTME: Session extractors for handlers: required and optional verified accounts
// ABOUTME: Reuse claims the gateway already verified, else verify the request headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::auth::Claims;
use crate::errors::AppError;
use crate::resources::ServerResources;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;

fn resolve_claims(parts: &Parts, resources: &ServerResources) -> Option<Claims> {
    parts
        .extensions
        .get::<Claims>()
        .cloned()
        .or_else(|| resources.auth_manager.verify_headers(&parts.headers))
}

/// A verified account; rejects the request with 401 otherwise
#[derive(Debug, Clone)]
pub struct CurrentAccount {
    /// Account ID from the token subject
    pub account_id: Uuid,
    /// Verified claims
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<Arc<ServerResources>> for CurrentAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        resources: &Arc<ServerResources>,
    ) -> Result<Self, Self::Rejection> {
        let claims = resolve_claims(parts, resources).ok_or_else(AppError::auth_required)?;
        let account_id = claims.account_id()?;
        Ok(Self { account_id, claims })
    }
}

/// A verified account if the request carries a valid session
#[derive(Debug, Clone, Default)]
pub struct MaybeAccount(pub Option<CurrentAccount>);

#[async_trait]
impl FromRequestParts<Arc<ServerResources>> for MaybeAccount {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        resources: &Arc<ServerResources>,
    ) -> Result<Self, Self::Rejection> {
        let account = resolve_claims(parts, resources).and_then(|claims| {
            let account_id = claims.account_id().ok()?;
            Some(CurrentAccount { account_id, claims })
        });
        Ok(Self(account))
    }
}

impl MaybeAccount {
    /// Account ID, if verified
    #[must_use]
    pub fn account_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|account| account.account_id)
    }
}
