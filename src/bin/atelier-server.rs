// ABOUTME: Server binary: loads configuration, opens the database and serves HTTP
// ABOUTME: Command-line flags override the matching environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Atelier Server Binary

use anyhow::Result;
use atelier_server::config::ServerConfig;
use atelier_server::database::Database;
use atelier_server::errors::configure_error_reporting;
use atelier_server::logging::LoggingConfig;
use atelier_server::resources::ServerResources;
use atelier_server::server;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "atelier-server")]
#[command(about = "Atelier - website builder backend with LLM chat")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database.url = database_url;
    }
    config.validate()?;

    LoggingConfig::for_environment(config.environment).init()?;
    configure_error_reporting(
        config.environment.to_string(),
        !config.environment.is_production(),
    );

    info!("Starting Atelier server");
    info!("{}", config.summary());

    let database = Database::new(&config.database.url, config.database.max_connections).await?;
    let resources = Arc::new(ServerResources::new(database, Arc::new(config))?);

    if let Err(e) = server::serve(resources).await {
        error!("Server error: {e:#}");
        return Err(e);
    }
    Ok(())
}
