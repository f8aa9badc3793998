// ABOUTME: Request gateway run before every handler: headers, CORS, rate limits, and route guards
// ABOUTME: Page guards wrap every route; rate limits and API session checks wrap the API group
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Request Gateway
//!
//! Two middleware functions run around the handlers. [`request_gateway`]
//! wraps every route; [`api_gateway`] wraps the `/api` routes, inside the
//! CORS layer. For each request, in order:
//!
//! 1. baseline security headers are scheduled for the response
//! 2. `/api` routes: the CORS layer answers browser preflights, any other
//!    `OPTIONS` answers `200`, everything else is counted by the rate limiter
//!    and may be rejected `429`
//! 3. protected routes need a verified session: APIs answer `401`, pages
//!    redirect to the login page with a `returnTo` parameter
//! 4. login and register pages redirect signed-in visitors to the dashboard
//! 5. the content security policy is scheduled for the response
//! 6. the request reaches its handler
//!
//! Verified claims are stored in the request extensions for the handlers.

use super::rate_limiting::{client_address, create_rate_limit_headers, create_rate_limit_response};
use crate::errors::AppError;
use crate::rate_limiting::path_matches_prefix;
use crate::resources::ServerResources;
use crate::security::headers::apply_content_security_policy;
use atelier_core::constants::routes::{API_PREFIX, DASHBOARD_PAGE, LOGIN_PAGE, RETURN_TO_PARAM};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use http::{Method, StatusCode, Uri};
use std::sync::Arc;
use tracing::{debug, warn, Span};

/// Outer gate for every route, installed with `axum::middleware::from_fn_with_state`
pub async fn request_gateway(
    State(resources): State<Arc<ServerResources>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = match page_gate(&resources, &request) {
        Some(early) => early,
        None => next.run(request).await,
    };

    let headers = response.headers_mut();
    resources.security_headers.apply(headers);
    apply_content_security_policy(headers, &resources.content_security_policy);
    response
}

/// Inner gate for `/api` routes: rate limiting and session checks
pub async fn api_gateway(
    State(resources): State<Arc<ServerResources>>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    let path = request.uri().path().to_owned();
    let client = client_address(
        request.headers(),
        request.extensions(),
        resources.config.rate_limit.trust_proxy_headers,
    );
    let now = Utc::now();
    let decision = resources.rate_limiter.check_at(&client, &path, now);
    if !decision.allowed {
        warn!(
            client = %client,
            route = %decision.route,
            limit = decision.limit,
            count = decision.count,
            "Rate limit exceeded"
        );
        return create_rate_limit_response(&decision, now);
    }

    let protected = resources
        .config
        .routes
        .protected_api_prefixes
        .iter()
        .any(|prefix| path_matches_prefix(&path, prefix));
    let mut response = if protected {
        match resources.auth_manager.verify_headers(request.headers()) {
            Some(claims) => {
                Span::current().record("account_id", claims.sub.as_str());
                request.extensions_mut().insert(claims);
                next.run(request).await
            }
            None => {
                debug!(%path, "Protected API requested without a valid session");
                AppError::auth_required().into_response()
            }
        }
    } else {
        next.run(request).await
    };

    response
        .headers_mut()
        .extend(create_rate_limit_headers(&decision, now));
    response
}

/// Page guards; `Some` ends the request early
fn page_gate(resources: &ServerResources, request: &Request) -> Option<Response> {
    let path = request.uri().path();
    if path_matches_prefix(path, API_PREFIX) {
        return None;
    }
    let policy = &resources.config.routes;

    if policy
        .protected_page_prefixes
        .iter()
        .any(|prefix| path_matches_prefix(path, prefix))
    {
        if resources.auth_manager.verify_headers(request.headers()).is_none() {
            debug!(%path, "Protected page requested without a valid session");
            return Some(login_redirect(request.uri()));
        }
        return None;
    }

    if policy
        .auth_only_pages
        .iter()
        .any(|page| path_matches_prefix(path, page))
        && resources.auth_manager.verify_headers(request.headers()).is_some()
    {
        return Some(Redirect::temporary(DASHBOARD_PAGE).into_response());
    }

    None
}

/// Redirect to the login page, remembering where the visitor was going
fn login_redirect(uri: &Uri) -> Response {
    let original = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |path_and_query| path_and_query.as_str());
    let location = format!(
        "{LOGIN_PAGE}?{RETURN_TO_PARAM}={}",
        urlencoding::encode(original)
    );
    Redirect::temporary(&location).into_response()
}
