//! Configuration command implementation for the ndnfw CLI

use anyhow::{Context, Result};
use log::info;
use rust_ndnfw_core::NodeConfig;
use std::path::PathBuf;

/// Load (or default) the node configuration and print it as JSON
pub fn show_config(file: Option<PathBuf>) -> Result<()> {
    let node = match file {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            NodeConfig::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => NodeConfig::default(),
    };

    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(())
}
