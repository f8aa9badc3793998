// ABOUTME: Payment route handlers for signed-in accounts
// ABOUTME: Creates a provider customer and payment intent for client-side confirmation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::JsonBody;
use crate::errors::AppError;
use crate::external::CreatePaymentIntent;
use crate::middleware::CurrentAccount;
use crate::resources::ServerResources;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

/// Payment routes handler
pub struct PaymentRoutes;

impl PaymentRoutes {
    /// Create all payment routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/payments/create-intent", post(Self::create_intent))
            .with_state(resources)
    }

    async fn create_intent(
        State(resources): State<Arc<ServerResources>>,
        current: CurrentAccount,
        JsonBody(request): JsonBody<CreatePaymentIntent>,
    ) -> Result<Response, AppError> {
        let intent = resources
            .payments
            .create_payment_intent(current.account_id, &current.claims.email, &request)
            .await?;
        info!(account_id = %current.account_id, customer_id = %intent.customer_id, "Payment intent created");
        Ok(Json(intent).into_response())
    }
}
