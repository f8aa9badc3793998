// ABOUTME: Scheduling route handlers exposing bookable consultation slots
// ABOUTME: Defaults to a one-week window starting now when no range is given
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::errors::{AppError, AppResult};
use crate::resources::ServerResources;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Default window length when `end` is omitted
const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Query of `GET /api/scheduling/slots`
#[derive(Debug, Default, Deserialize)]
pub struct SlotsQuery {
    /// Window start, RFC 3339
    #[serde(default)]
    pub start: Option<String>,
    /// Window end, RFC 3339
    #[serde(default)]
    pub end: Option<String>,
}

impl SlotsQuery {
    /// Resolve the window, filling defaults relative to `now`
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` when either bound is not RFC 3339
    pub fn window(&self, now: DateTime<Utc>) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
        let start = parse_bound("start", self.start.as_deref())?.unwrap_or(now);
        let end = parse_bound("end", self.end.as_deref())?
            .unwrap_or_else(|| start + Duration::days(DEFAULT_WINDOW_DAYS));
        Ok((start, end))
    }
}

fn parse_bound(name: &str, value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| AppError::invalid_input(format!("{name} must be an RFC 3339 timestamp"))),
    }
}

/// Scheduling routes handler
pub struct SchedulingRoutes;

impl SchedulingRoutes {
    /// Create all scheduling routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/scheduling/slots", get(Self::slots))
            .with_state(resources)
    }

    async fn slots(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<SlotsQuery>,
    ) -> Result<Response, AppError> {
        // Missing credentials are reported before the query is looked at
        resources.scheduling.ensure_configured()?;
        let (start, end) = query.window(Utc::now())?;
        let slots = resources.scheduling.available_slots(start, end).await?;
        Ok(Json(slots).into_response())
    }
}
