// ABOUTME: Calendly client that lists open consultation slots in a time window
// ABOUTME: Configuration is checked before any request leaves the process
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::http::{build_client, decode_response, map_send_error};
use crate::config::SchedulingConfig;
use crate::errors::{AppError, AppResult};
use atelier_core::constants::service_names::SCHEDULING;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Open slot start times
#[derive(Debug, Clone, Serialize)]
pub struct AvailableSlots {
    /// Start of each bookable slot, earliest first
    pub slots: Vec<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AvailableTimesResponse {
    #[serde(default)]
    collection: Vec<AvailableTime>,
}

#[derive(Debug, Deserialize)]
struct AvailableTime {
    status: String,
    start_time: DateTime<Utc>,
}

/// Calendly REST client
pub struct SchedulingClient {
    client: Client,
    api_token: Option<String>,
    event_type: Option<String>,
    base_url: String,
}

impl SchedulingClient {
    /// Create a client; missing credentials only fail when slots are requested
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &SchedulingConfig, timeout_secs: u64) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_token: config.api_token.clone(),
            event_type: config.event_type.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Token and event type, or the configuration error to report
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` naming the first unset variable
    pub fn ensure_configured(&self) -> AppResult<(&str, &str)> {
        let api_token = self
            .api_token
            .as_deref()
            .ok_or_else(|| AppError::config_missing("CALENDLY_API_TOKEN"))?;
        let event_type = self
            .event_type
            .as_deref()
            .ok_or_else(|| AppError::config_missing("CALENDLY_EVENT_TYPE"))?;
        Ok((api_token, event_type))
    }

    /// Available slots between `start` and `end`
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` when the token or event type is unset,
    /// `INVALID_INPUT` for an empty window, and provider errors as 503s or
    /// forwarded 4xx
    #[instrument(skip(self))]
    pub async fn available_slots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<AvailableSlots> {
        let (api_token, event_type) = self.ensure_configured()?;
        if end <= start {
            return Err(AppError::invalid_input("end must be after start"));
        }

        let start_time = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_time = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let response = self
            .client
            .get(format!("{}/event_type_available_times", self.base_url))
            .bearer_auth(api_token)
            .query(&[
                ("event_type", event_type),
                ("start_time", start_time.as_str()),
                ("end_time", end_time.as_str()),
            ])
            .send()
            .await
            .map_err(|e| map_send_error(SCHEDULING, &e))?;
        let times: AvailableTimesResponse = decode_response(SCHEDULING, response).await?;

        let mut slots: Vec<DateTime<Utc>> = times
            .collection
            .into_iter()
            .filter(|time| time.status == "available")
            .map(|time| time.start_time)
            .collect();
        slots.sort_unstable();
        debug!(count = slots.len(), "Fetched available slots");

        Ok(AvailableSlots { slots })
    }
}
