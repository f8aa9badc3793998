// ABOUTME: Global tracing subscriber setup for the Atelier server
// ABOUTME: JSON lines in production, human-readable output elsewhere, quiet dependency crates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Logging
//!
//! The level comes from `RUST_LOG` and the output format from `LOG_FORMAT`
//! (`json`, `pretty` or `compact`). Without `LOG_FORMAT` the deployment
//! environment decides: production writes JSON, everything else pretty text.

use crate::config::Environment;
use anyhow::Result;
use atelier_core::constants::service_names;
use std::env;
use std::io;
use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Dependency crates that are too chatty at `info`
const QUIET_TARGETS: &[&str] = &["hyper=warn", "reqwest=warn", "sqlx=warn", "tower_http=info"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-field human-readable output
    Pretty,
    /// Single-line output without targets
    Compact,
}

impl LogFormat {
    /// Parse a `LOG_FORMAT` value, falling back to the environment default
    #[must_use]
    pub fn resolve(value: Option<&str>, environment: Environment) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty") => Self::Pretty,
            Some("compact") => Self::Compact,
            _ if environment.is_production() => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Attach file and line to each event
    pub include_location: bool,
    /// Emit span open and close events
    pub include_spans: bool,
    /// Deployment environment reported in the startup line
    pub environment: Environment,
}

impl LoggingConfig {
    /// Settings for an environment, honoring the logging variables
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        let format = LogFormat::resolve(env::var("LOG_FORMAT").ok().as_deref(), environment);
        Self {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            format,
            include_location: environment.is_production()
                || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_spans: env::var("LOG_INCLUDE_SPANS").is_ok(),
            environment,
        }
    }

    fn filter(&self) -> EnvFilter {
        QUIET_TARGETS
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(EnvFilter::new(&self.level), EnvFilter::add_directive)
    }

    fn output_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_writer(io::stdout)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_span_events(span_events);

        match self.format {
            LogFormat::Json => base.json().boxed(),
            LogFormat::Pretty => base.with_target(true).boxed(),
            LogFormat::Compact => base.compact().with_target(false).boxed(),
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed
    pub fn init(&self) -> Result<()> {
        tracing_subscriber::registry()
            .with(self.output_layer())
            .with(self.filter())
            .try_init()?;

        info!(
            service.name = service_names::ATELIER_SERVER,
            service.version = env!("CARGO_PKG_VERSION"),
            environment = %self.environment,
            log.format = ?self.format,
            "Logging initialized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_format_wins() {
        assert_eq!(
            LogFormat::resolve(Some("compact"), Environment::Production),
            LogFormat::Compact
        );
        assert_eq!(
            LogFormat::resolve(Some("JSON"), Environment::Development),
            LogFormat::Json
        );
    }

    #[test]
    fn test_environment_default_format() {
        assert_eq!(LogFormat::resolve(None, Environment::Production), LogFormat::Json);
        assert_eq!(LogFormat::resolve(None, Environment::Development), LogFormat::Pretty);
        assert_eq!(
            LogFormat::resolve(Some("xml"), Environment::Testing),
            LogFormat::Pretty
        );
    }
}
