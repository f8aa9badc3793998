// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Re-exports the environment-driven ServerConfig and its sections
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Environment and server configuration
pub mod environment;

pub use environment::{
    parse_route_limits, AuthConfig, DatabaseConfig, Environment, ExternalServicesConfig,
    LlmConfig, PaymentsConfig, RateLimitConfig, RouteLimit, RoutePolicy, SchedulingConfig,
    SecurityConfig, ServerConfig,
};
