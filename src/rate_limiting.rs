// ABOUTME: Fixed-window request throttling keyed by client address and route family
// ABOUTME: Process-local counters held in a bounded LRU map behind a mutex
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Fixed Window Rate Limiting
//!
//! Each `(client, route prefix)` pair gets a counter that lives for one
//! window. The first request opens the window with a count of one; later
//! requests increment it and are rejected once the count exceeds the route's
//! ceiling. Once the current time passes the reset instant the next request
//! starts a fresh window.
//!
//! A client can burst up to twice the ceiling across a window boundary.
//! Counters are not shared between processes.

use crate::config::{RateLimitConfig, RouteLimit};
use atelier_core::constants::rate_limits::FALLBACK_ROUTE;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Whether `path` equals `prefix` or continues it at a `/` boundary
#[must_use]
pub fn path_matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'))
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Ceiling for the matched route family
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Count after this request
    pub count: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
    /// Route family the request was counted against
    pub route: String,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, at least one
    #[must_use]
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0);
        u64::try_from((millis + 999) / 1000).unwrap_or(0).max(1)
    }
}

/// Fixed-window rate limiter
pub struct FixedWindowRateLimiter {
    window: Duration,
    default_limit: u32,
    routes: Vec<RouteLimit>,
    counters: Mutex<LruCache<(String, String), WindowCounter>>,
}

impl FixedWindowRateLimiter {
    /// Build a limiter from configuration
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        let mut routes = config.route_limits.clone();
        // Longest prefix first so the most specific family wins
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        let capacity = NonZeroUsize::new(config.max_tracked_clients).unwrap_or(NonZeroUsize::MIN);

        Self {
            window: Duration::seconds(i64::try_from(config.window_secs).unwrap_or(i64::MAX)),
            default_limit: config.default_limit,
            routes,
            counters: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Window length
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Route family and ceiling that apply to `path`
    #[must_use]
    pub fn route_for(&self, path: &str) -> (&str, u32) {
        self.routes
            .iter()
            .find(|route| path_matches_prefix(path, &route.prefix))
            .map_or((FALLBACK_ROUTE, self.default_limit), |route| {
                (route.prefix.as_str(), route.limit)
            })
    }

    /// Count a request from `client` to `path` now
    pub fn check(&self, client: &str, path: &str) -> RateLimitDecision {
        self.check_at(client, path, Utc::now())
    }

    /// Count a request at an explicit instant
    pub fn check_at(&self, client: &str, path: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let (route, limit) = self.route_for(path);
        let route = route.to_owned();
        let window = self.window;

        let counter = {
            let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
            let counter = counters.get_or_insert_mut((client.to_owned(), route.clone()), || {
                WindowCounter {
                    count: 0,
                    reset_at: now + window,
                }
            });
            if now > counter.reset_at {
                *counter = WindowCounter {
                    count: 0,
                    reset_at: now + window,
                };
            }
            counter.count = counter.count.saturating_add(1);
            *counter
        };

        RateLimitDecision {
            allowed: counter.count <= limit,
            limit,
            remaining: limit.saturating_sub(counter.count),
            count: counter.count,
            reset_at: counter.reset_at,
            route,
        }
    }

    /// Number of live counters
    #[must_use]
    pub fn tracked_counters(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
