// ABOUTME: Server binary wiring configuration, logging, stores, and the HTTP router
// ABOUTME: Standalone mode runs against in-memory stores with a static token table
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Milo Coach Server Binary
//!
//! Starts the coach backend over the OpenAI-compatible chat backend named in
//! the environment. Storage and identity default to the in-memory
//! implementations; production deployments swap in the managed-store
//! adapters at this wiring point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use milo_coach_server::{
    config::ServerConfig,
    llm::OpenAiCompatibleProvider,
    logging,
    resources::ServerResources,
    routes,
    store::{MemoryStore, StaticTokenVerifier},
    streaming::MemoryStreamStore,
};

#[derive(Parser)]
#[command(name = "milo-coach-server")]
#[command(about = "Milo Coach - AI strength-coaching backend")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Register a demo bearer token as "token:uid" (repeatable)
    #[arg(long)]
    demo_token: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }

    logging::init_from_env()?;

    info!("Starting Milo Coach Server");
    info!("{}", config.summary());

    let provider = Arc::new(OpenAiCompatibleProvider::new(config.llm.clone())?);

    let verifier = StaticTokenVerifier::new();
    for pair in &args.demo_token {
        if let Some((token, uid)) = pair.split_once(':') {
            verifier.insert(token, uid);
        }
    }

    let resources = ServerResources::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(verifier),
        provider,
        Arc::new(MemoryStreamStore::new()),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], resources.config.http_port));
    let app = routes::router(resources);

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {e}");
    }
    info!("Shutdown signal received");
}
