//! RFMForge service entrypoint
//!
//! Parses arguments, initializes logging, and serves the analysis API.

use anyhow::{Context, Result};
use clap::Parser;
use rfmforge::{build_router, AppState, Args};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("rfmforge={default_level}").parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting rfmforge");

    let state = AppState::new();
    let app = build_router(state);

    let addr = args
        .bind_address()
        .with_context(|| format!("invalid bind address {}:{}", args.host, args.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("rfmforge listening on {addr}");

    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;
    Ok(())
}
