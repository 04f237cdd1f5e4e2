//! inv-daemon entry point.
//!
//! Thin by intent: loads `.env.local`, sets up tracing, builds the node from
//! layered config, serves until ctrl-c, then shuts down cleanly.

use std::sync::Arc;

use anyhow::Context;
use inv_config::{
    load_layered_yaml, report_unused_keys, ConfigRole, NodeConfig, UnusedKeyPolicy,
};
use inv_daemon::state::NodeHost;
use tracing::{info, warn};

const DEFAULT_CONFIG: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs).context("loading node config")?;

    let report = report_unused_keys(ConfigRole::Node, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &report.unused_leaf_pointers {
        warn!(pointer = %ptr, "config_key_unused");
    }

    let config = NodeConfig::from_loaded(&loaded)?;
    let host = Arc::new(NodeHost::new(config)?.with_config_hash(loaded.config_hash.clone()));
    info!(config_hash = %loaded.config_hash, paths = ?paths, "inv-daemon starting");

    let handle = host.serve();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutdown requested");

    handle.shutdown().await
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `INV_CONFIG` holds comma-separated layered config paths, base first.
fn config_paths_from_env() -> Vec<String> {
    let raw = std::env::var("INV_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let paths: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if paths.is_empty() {
        vec![DEFAULT_CONFIG.to_string()]
    } else {
        paths
    }
}
