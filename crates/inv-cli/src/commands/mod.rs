//! Command handler modules for inv-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod bench;
pub mod simulate;

use anyhow::{Context, Result};
use inv_config::{report_unused_keys, ConfigRole, NodeConfig, UnusedKeyPolicy};

// ---------------------------------------------------------------------------
// Simulation config
// ---------------------------------------------------------------------------

/// Layered config used by `simulate`. Loaded and validated exactly like the
/// node's, so a simulation never runs on values the node would refuse.
pub fn load_sim_config(paths: &[String]) -> Result<NodeConfig> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = inv_config::load_layered_yaml(&refs)?;
    let report = report_unused_keys(
        ConfigRole::Simulation,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    for ptr in &report.unused_leaf_pointers {
        tracing::debug!(pointer = %ptr, "simulation ignores config key");
    }
    NodeConfig::from_loaded(&loaded)
        .with_context(|| format!("simulation config {}", paths.join(",")))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A report printed as one `key=value` line per field.
pub trait KvReport {
    fn kv(&self) -> Vec<(&'static str, String)>;
}

pub fn print_kv(report: &dyn KvReport) {
    for (k, v) in report.kv() {
        println!("{k}={v}");
    }
}

/// Nearest-rank percentile of an ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
