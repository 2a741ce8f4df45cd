// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! CT log front-end entrypoint: loads the log configuration, connects to the
//! Merkle log backend, and serves the RFC 6962 endpoints for every
//! configured instance.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ct_server::backend::GrpcBackend;
use ct_server::config;
use ct_server::instance;
use ct_server::util::{SystemTimeSource, TimeSource};
use log_rpc::MerkleLogClient;

#[derive(Debug, Parser)]
#[command(name = "ct_server")]
#[command(about = "RFC 6962 CT log front-end for a Merkle log backend")]
struct Args {
    /// Port to serve CT log requests on.
    #[arg(long, default_value_t = 6962)]
    port: u16,

    /// Backend log RPC server to use.
    #[arg(long, default_value = "http://127.0.0.1:8090")]
    log_rpc_server: String,

    /// Deadline for backend RPC requests, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    rpc_deadline_ms: u64,

    /// File holding the log configuration in JSON.
    #[arg(long)]
    log_config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let configs = config::load_config(&args.log_config)?;

    // Connect before serving so we never accept requests we cannot satisfy.
    let client = MerkleLogClient::connect(args.log_rpc_server.clone())
        .await
        .with_context(|| format!("failed to connect to backend at {}", args.log_rpc_server))?;
    info!(backend = %args.log_rpc_server, "connected to log backend");

    let time_source: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let backend = Arc::new(GrpcBackend::new(client, time_source.clone()));
    let router = instance::build_registry(
        &configs,
        backend,
        Duration::from_millis(args.rpc_deadline_ms),
        time_source,
    )?;

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!(%addr, logs = configs.len(), "ct front-end listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    warn!("server exited");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
