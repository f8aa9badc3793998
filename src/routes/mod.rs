// ABOUTME: Route module organization and the top-level router with its middleware stack
// ABOUTME: Request IDs, tracing, body limits, and the gateway wrap every route
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Route module for the Atelier server
//!
//! Each domain module exposes a `routes` constructor with thin handlers that
//! delegate to the stores and clients in [`ServerResources`].

/// Registration, login, logout, demo access, and the current account
pub mod auth;
/// Chat messages and conversation history
pub mod chat;
/// Liveness endpoint
pub mod health;
/// Server-rendered placeholder pages
pub mod pages;
/// Payment intents
pub mod payments;
/// Consultation slot lookup
pub mod scheduling;
/// Single-page website generation
pub mod website;

pub use auth::AuthRoutes;
pub use chat::ChatRoutes;
pub use health::HealthRoutes;
pub use pages::PageRoutes;
pub use payments::PaymentRoutes;
pub use scheduling::SchedulingRoutes;
pub use website::WebsiteRoutes;

use crate::errors::AppError;
use crate::middleware::{api_gateway, request_gateway, setup_cors, trace_layer};
use crate::resources::ServerResources;
use axum::extract::FromRequest;
use axum::middleware::from_fn_with_state;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// JSON body extractor whose rejections are `INVALID_INPUT` errors
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Build the full application router
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let api = Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(ChatRoutes::routes(resources.clone()))
        .merge(AuthRoutes::routes(resources.clone()))
        .merge(PaymentRoutes::routes(resources.clone()))
        .merge(SchedulingRoutes::routes(resources.clone()))
        .merge(WebsiteRoutes::routes(resources.clone()))
        .layer(from_fn_with_state(resources.clone(), api_gateway))
        .layer(setup_cors(&resources.config.security));

    Router::new()
        .merge(api)
        .merge(PageRoutes::routes())
        .layer(from_fn_with_state(resources, request_gateway))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace_layer())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
}
