//! `wireline` binary: serve the school directory or call a running server.

mod cli;

use std::{error::Error, sync::Arc};

use clap::Parser;
use serde_json::value::RawValue;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wireline::{
    client::Client,
    config::{LogFormat, LoggingConfig, Settings},
    context::Context,
    directory::{Directory, register_handlers},
    message::Payload,
    router::Router,
    server::{Server, ShutdownOutcome},
};

use crate::cli::{Cli, Command};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    init_logging(&settings.logging)?;

    match cli.command {
        Command::Serve { address } => serve(settings, address).await,
        Command::Call {
            address,
            request_type,
            payload,
        } => call(settings, address, &request_type, payload).await,
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(config: &LoggingConfig) -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

async fn serve(settings: Settings, address: Option<String>) -> Result<(), BoxError> {
    let mut config = settings.server;
    if let Some(address) = address {
        config = config.with_address(address);
    }

    let router = Arc::new(Router::new());
    register_handlers(&router, &Arc::new(Directory::new()));
    let server = Server::with_router(config, router);

    let ctx = Context::background();
    let addr = server.start(&ctx).await?;
    info!(%addr, "wireline serving the school directory");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    match server.shutdown().await {
        ShutdownOutcome::Drained => info!("all sessions drained"),
        ShutdownOutcome::TimedOut { remaining } => {
            warn!(remaining, "shutdown timed out with sessions still running");
        }
    }
    Ok(())
}

async fn call(
    settings: Settings,
    address: Option<String>,
    request_type: &str,
    payload: Option<String>,
) -> Result<(), BoxError> {
    let mut config = settings.client;
    if let Some(address) = address {
        config = config.with_address(address);
    }
    let payload = match payload {
        Some(text) => Payload::from_raw(RawValue::from_string(text)?),
        None => Payload::none(),
    };

    let client = Client::new(config);
    client.connect().await?;
    let result = client
        .send(&Context::background(), request_type, payload)
        .await;
    client.close().await?;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
