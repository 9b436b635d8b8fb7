// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lyktparad root bridge — discovery, registration, heartbeat/state, mesh
//! mirror, and RPC listener between a lighting mesh and an optional LAN
//! coordinator.
//!
//! This binary wires the crate's collaborators to the in-memory
//! [`lyktparad_mesh::LoopbackMesh`]/[`lyktparad_mesh::InMemoryPluginRuntime`]
//! test doubles rather than real radio/lighting hardware, since both are
//! out of scope for this workspace — a firmware build would replace those
//! two lines with its own [`MeshLayer`]/[`PluginRuntime`] implementations
//! and, if it runs its own election, feed transitions into the
//! [`RoleObserver`] this binary otherwise holds fixed at [`MeshRole::Root`].
//!
//! # Usage
//!
//! ```bash
//! # Start on the default ports
//! lyktparad-root
//!
//! # Load layered config from a file, override the rpc port
//! lyktparad-root --config root.json --rpc-port 9082
//! ```

mod api;
mod bridge;
mod cache;
mod config;
mod discovery;
mod error;
mod heartbeat_counter;
mod mirror;
mod outbound;
mod registration;
mod tasks;

use error::RootError;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use lyktparad_mesh::{InMemoryPluginRuntime, LoopbackMesh, MeshLayer, MeshRole, PluginRuntime, RoleObserver};
use tokio::sync::Notify;
use tracing::info;

use bridge::Bridge;
use cache::{read_cached_server, CachedServer};
use config::RootConfig;
use discovery::Discovery;
use heartbeat_counter::LocalHeartbeatCounter;
use outbound::OutboundLink;

/// Lyktparad root bridge
#[derive(Parser, Debug)]
#[command(name = "lyktparad-root")]
#[command(about = "Mesh-side bridge: discovery, registration, and RPC listener for the lyktparad mesh")]
#[command(version)]
struct Args {
    /// Optional JSON config file; CLI flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the RPC listener and outbound socket to.
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Fixed well-known port the RPC listener binds to.
    #[arg(long = "rpc-port")]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Mesh node identity this root presents (six hex bytes, colon-separated).
    #[arg(long, default_value = "00:00:00:00:00:01")]
    mesh_id: String,

    /// IPv4 address this root reports as its own, in registration and state.
    #[arg(long, default_value = "127.0.0.1")]
    root_ip: std::net::Ipv4Addr,
}

fn load_config(args: &Args) -> RootConfig {
    let mut config = match &args.config {
        Some(path) => RootConfig::from_file(path).unwrap_or_else(|e| {
            tracing::warn!("failed to load {}: {e}, using defaults", path.display());
            RootConfig::default()
        }),
        None => RootConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.rpc_port {
        config.rpc_port = port;
    }
    config
}

fn parse_mesh_id(s: &str) -> [u8; 6] {
    let mut id = [0u8; 6];
    for (slot, part) in id.iter_mut().zip(s.split(':')) {
        *slot = u8::from_str_radix(part, 16).unwrap_or(0);
    }
    id
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(filter).with_target(false).init();

    if let Err(e) = run(args).await {
        eprintln!("lyktparad-root: {e}");
        std::process::exit(1);
    }
}

/// Startup and run loop. Every fallible step before the bridge is up routes
/// through [`RootError`] so this is the one place that decides whether a
/// given failure is fatal; `main` only has to report and exit.
async fn run(args: Args) -> Result<(), RootError> {
    let config = load_config(&args);
    config.validate()?;
    let config = Arc::new(config);

    let kv: Arc<dyn lyktparad_kv::KvStore> = Arc::new(lyktparad_kv::JsonFileKvStore::open(&config.cache_path)?);
    if let Some(cached) = read_cached_server(kv.as_ref()) {
        info!("cached coordinator from a previous discovery: {}:{}", cached.addr, cached.port);
    }

    let link = Arc::new(
        OutboundLink::bind(config.bind_address, config.checksum_policy())
            .await
            .map_err(|e| RootError::Bind(e.to_string()))?,
    );

    let mesh_id = parse_mesh_id(&args.mesh_id);
    let mesh: Arc<dyn MeshLayer> = Arc::new(LoopbackMesh::new(mesh_id, args.root_ip.octets(), 1));
    let plugin: Arc<dyn PluginRuntime> = Arc::new(InMemoryPluginRuntime::new(config.firmware_version.clone()));

    // Single-node deployment: this root never loses the role to a mesh
    // election, since that election is out of scope here.
    let (_role_observer, role_rx) = RoleObserver::new(MeshRole::Root);

    let shutdown = Arc::new(Notify::new());
    let registered = Arc::new(AtomicBool::new(false));

    let discovery = Discovery::new(config.clone(), kv.clone(), link.clone(), mesh.clone(), registered.clone());
    let discovery_shutdown = shutdown.clone();
    let discovery_link = link.clone();
    let discovery_task = tokio::spawn(async move {
        if discovery.run(discovery_shutdown.as_ref()).await {
            info!("registered with coordinator at {:?}", discovery_link.dest());
        }
    });

    let heartbeat_counter = Arc::new(LocalHeartbeatCounter::new());
    let counter_task = tokio::spawn(heartbeat_counter::run(heartbeat_counter, shutdown.clone()));

    let bridge = Bridge::new(config.clone(), link.clone(), mesh.clone(), plugin.clone(), role_rx, registered);
    let bridge_shutdown = shutdown.clone();
    let bridge_task = tokio::spawn(bridge.run(bridge_shutdown));

    info!("root bridge running, rpc listener on port {}", config.rpc_port);

    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
    shutdown.notify_waiters();

    let _ = tokio::join!(discovery_task, bridge_task, counter_task);

    if let Some(dest) = link.dest() {
        if let (IpAddr::V4(addr), port) = (dest.ip(), dest.port()) {
            if let Err(e) = cache::write_cached_server(kv.as_ref(), CachedServer { addr, port }) {
                tracing::warn!("failed to persist server cache on shutdown: {e}");
            }
        }
    }

    Ok(())
}
