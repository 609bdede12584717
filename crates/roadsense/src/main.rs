//! Roadsense relay server binary.
//!
//! Serves HTTP and WebSocket on one port: live telemetry fan-out to
//! viewers, worker-driven recording sessions, and the routing proxy.

#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roadsense_server::routing::RouteProxy;
use roadsense_server::session::SessionCore;
use roadsense_server::websocket::BroadcastHub;
use roadsense_server::{AppState, metrics, router};
use roadsense_settings::{init_settings, load_settings, load_settings_from_path};
use roadsense_store::RestStore;

#[derive(Debug, Parser)]
#[command(
    name = "roadsense",
    about = "Telemetry relay and session recorder for road-inspection robots"
)]
struct Args {
    /// Settings file (default: `~/.roadsense/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => load_settings().context("loading settings")?,
    };
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone())),
        )
        .init();

    let metrics_handle = metrics::install_recorder();

    let hub = Arc::new(BroadcastHub::new());
    let store = Arc::new(RestStore::new(
        settings.storage.url.clone(),
        &settings.storage.api_key,
    ));
    let core = Arc::new(SessionCore::new(Arc::clone(&hub), store));
    let proxy = Arc::new(RouteProxy::new(settings.routing.upstreams.clone()));

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid listen address")?;
    init_settings(settings);

    let state = AppState {
        core,
        hub,
        proxy,
        metrics: metrics_handle,
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "roadsense relay listening (http + websocket)");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C (or SIGTERM where available).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install sigterm handler");
        tokio::select! {
            () = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
