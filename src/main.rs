//! ndnfw forwarding daemon.
//!
//! Opens the UDP faces listed in the node configuration, installs the static
//! routes and forwards until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rust_ndnfw_common::ndn::Name;
use rust_ndnfw_core::{forwarder, Fib, Forwarder, Node, NodeConfig, SystemClock, UdpFace};
use std::{collections::HashMap, path::PathBuf, sync::Arc};

/// Named Data Networking forwarder
#[derive(Parser)]
#[clap(author, version, about)]
struct Args {
    /// Node configuration file (TOML or JSON)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Sets the level of verbosity
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if args.verbose { "debug" } else { "info" }
    )).init();

    let node_config = match &args.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            warn!("No configuration file given, starting without faces");
            NodeConfig::default()
        }
    };

    let (inbox_tx, inbox_rx) = forwarder::inbox();
    let mut forwarder = Forwarder::with_defaults(
        node_config.forwarder.clone(),
        Arc::new(SystemClock),
        inbox_tx,
    );

    let mut face_ids = HashMap::new();
    for face in &node_config.faces {
        let udp = UdpFace::bind(face.local, face.remote)
            .await
            .with_context(|| format!("Failed to open face '{}'", face.name))?;
        let id = forwarder.add_face(udp)?;
        face_ids.insert(face.name.as_str(), id);
    }

    for route in &node_config.routes {
        let prefix: Name = route.prefix.parse()?;
        let face = face_ids
            .get(route.face.as_str())
            .copied()
            .with_context(|| format!("Route {} uses unknown face '{}'", route.prefix, route.face))?;
        info!("Route {} -> {} (cost {})", prefix, face, route.cost);
        forwarder.fib_mut().add_route(prefix, face, route.cost);
    }

    let metrics = forwarder.metrics();
    let mut node = Node::new(forwarder, inbox_rx);
    node.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    println!("{}", serde_json::to_string_pretty(&metrics.snapshot())?);
    Ok(())
}
