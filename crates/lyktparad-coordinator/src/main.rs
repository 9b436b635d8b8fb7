// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lyktparad coordinator — LAN session registry, liveness monitor, and
//! HTTP<->datagram RPC bridge for the lyktparad mesh.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default ports
//! lyktparad-coordinator
//!
//! # Load layered config from a file, override the HTTP port
//! lyktparad-coordinator --config coordinator.json --http-port 9000
//! ```

mod app;
mod config;
mod datagram;
mod discovery;
mod error;
mod handlers;
mod liveness;
mod pending;
mod routes;
mod session;
mod state;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::sync::{Notify, RwLock};
use tracing::info;

use app::AppState;
use config::CoordinatorConfig;
use datagram::DatagramService;
use discovery::ServiceAdvertiser;
use pending::PendingRpcMap;
use session::SessionRegistry;
use state::StateStore;

/// Lyktparad coordinator
#[derive(Parser, Debug)]
#[command(name = "lyktparad-coordinator")]
#[command(about = "LAN coordinator bridging HTTP to the lyktparad mesh root over UDP")]
#[command(version)]
struct Args {
    /// Optional JSON config file; CLI flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind every listener to.
    #[arg(long)]
    bind: Option<IpAddr>,

    /// HTTP ingress port.
    #[arg(long = "http-port")]
    http_port: Option<u16>,

    /// Datagram ingress port (register/heartbeat/state/mirror).
    #[arg(long = "udp-port")]
    udp_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Hostname advertised over mDNS.
    #[arg(long, default_value = "lyktparad-coordinator")]
    hostname: String,
}

fn load_config(args: &Args) -> CoordinatorConfig {
    let mut config = match &args.config {
        Some(path) => CoordinatorConfig::from_file(path).unwrap_or_else(|e| {
            tracing::warn!("failed to load {}: {e}, using defaults", path.display());
            CoordinatorConfig::default()
        }),
        None => CoordinatorConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(port) = args.udp_port {
        config.udp_port = port;
    }
    config
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(filter).with_target(false).init();

    let config = load_config(&args);
    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    }
    let config = Arc::new(config);

    let registry = Arc::new(RwLock::new(SessionRegistry::new()));
    let state_store = Arc::new(RwLock::new(StateStore::new()));
    let pending = Arc::new(PendingRpcMap::new());

    let datagram = match DatagramService::bind(config.clone(), registry.clone(), state_store.clone(), pending.clone()).await {
        Ok(svc) => Arc::new(svc),
        Err(e) => {
            eprintln!("failed to bind datagram socket: {e}");
            std::process::exit(1);
        }
    };
    info!("datagram service listening on {}", datagram.local_addr().unwrap());

    let advertiser = match ServiceAdvertiser::start(&config, &args.hostname) {
        Ok(a) => Some(a),
        Err(e) => {
            tracing::warn!("mDNS advertisement disabled: {e}");
            None
        }
    };

    let shutdown = Arc::new(Notify::new());

    let datagram_task = tokio::spawn({
        let datagram = datagram.clone();
        let shutdown = shutdown.clone();
        async move { datagram.run(shutdown).await }
    });

    let liveness_task = tokio::spawn(liveness::run(config.clone(), registry.clone(), state_store.clone(), shutdown.clone()));

    let janitor_task = tokio::spawn(pending::run_janitor(
        pending.clone(),
        config.janitor_sweep_interval(),
        config.pending_max_age(),
        shutdown.clone(),
    ));

    let broadcast_task = tokio::spawn(discovery::run_broadcast_emitter(config.clone(), shutdown.clone()));

    let app_state = Arc::new(AppState {
        registry,
        state_store,
        pending,
        datagram,
        config: config.clone(),
        started_at: Instant::now(),
    });
    let router = routes::build_router(app_state);

    let http_addr = std::net::SocketAddr::new(config.bind_address, config.http_port);
    let listener = match tokio::net::TcpListener::bind(http_addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to bind HTTP listener on {http_addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("HTTP ingress listening on http://{http_addr}");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await;
    if let Err(e) = serve_result {
        tracing::error!("HTTP server error: {e}");
    }

    shutdown.notify_waiters();
    if let Some(a) = advertiser {
        a.stop();
    }
    let _ = tokio::join!(datagram_task, liveness_task, janitor_task, broadcast_task);
}
