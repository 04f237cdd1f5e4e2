//! Shared fixtures for scenario tests and CLI simulations.

mod transport;

pub use inv_clock::ManualClock;
pub use transport::{sync_until_confirmed, LossyTransport, SyncRounds};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use inv_clock::{HybridClock, NANOS_PER_SEC};
use inv_config::{load_layered_yaml_from_strings, NodeConfig};
use inv_ledger::{Backoff, CommitWait, Ledger, LedgerSettings, RetryPolicy};

/// A complete node config: Virginia leads, Kolkata stands by.
pub const FIXTURE_YAML: &str = r#"
node:
  node_id: "server-virginia"
quorum:
  leader_region: "us-east1"
  standby_region: "asia-south1"
  heartbeat_threshold_seconds: 5.0
  poll_interval_ms: 50
ledger:
  max_occ_retries: 3
  commit_wait_bounds_ms: [2, 8]
  backoff_bounds_ms: [10, 50]
  snapshot_history: 64
  skus:
    SKU-EXCLUSIVE-B: 500
inventory:
  initial_stock: 100
squads:
  milestones: [5, 10, 20]
"#;

/// Wall-clock start for manual clocks (any fixed, non-zero instant).
pub const FIXTURE_START_NANOS: u64 = 1_700_000_000 * NANOS_PER_SEC;

pub fn fixture_config() -> Result<NodeConfig> {
    fixture_config_with(&[])
}

/// Fixture config with YAML overlays applied in order.
pub fn fixture_config_with(overlays: &[&str]) -> Result<NodeConfig> {
    let mut docs = vec![FIXTURE_YAML];
    docs.extend_from_slice(overlays);
    let loaded = load_layered_yaml_from_strings(&docs).context("fixture yaml")?;
    NodeConfig::from_loaded(&loaded)
}

/// Write the fixture config to a temp dir. Keep the `TempDir` alive while
/// the path is in use.
pub fn fixture_config_file() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("base.yaml");
    std::fs::write(&path, FIXTURE_YAML)
        .with_context(|| format!("write fixture config {}", path.display()))?;
    Ok((dir, path))
}

/// Ledger on a manual clock with no commit-wait, no backoff and fixed
/// jitter seed. `stock` seeds `SKU-EXCLUSIVE-B`.
pub fn deterministic_ledger(stock: i64, max_attempts: u32) -> Result<(Arc<ManualClock>, Arc<Ledger>)> {
    let wall = Arc::new(ManualClock::new(FIXTURE_START_NANOS));
    let ledger = Ledger::new(
        Arc::new(HybridClock::with_physical("server-virginia", wall.clone())),
        LedgerSettings {
            retry: RetryPolicy::new(max_attempts, Backoff::None),
            commit_wait: CommitWait::None,
            snapshot_history: 64,
            seed: Some(0),
        },
    );
    ledger.register_sku("SKU-EXCLUSIVE-B", stock)?;
    Ok((wall, Arc::new(ledger)))
}

/// Same as [`deterministic_ledger`] with a fixed commit-wait, so concurrent
/// orders genuinely overlap.
pub fn overlapping_ledger(stock: i64, max_attempts: u32, wait: Duration) -> Result<Arc<Ledger>> {
    let ledger = Ledger::new(
        Arc::new(HybridClock::new("server-virginia")),
        LedgerSettings {
            retry: RetryPolicy::new(max_attempts, Backoff::None),
            commit_wait: CommitWait::Fixed(wait),
            snapshot_history: 64,
            seed: Some(0),
        },
    );
    ledger.register_sku("SKU-EXCLUSIVE-B", stock)?;
    Ok(Arc::new(ledger))
}
