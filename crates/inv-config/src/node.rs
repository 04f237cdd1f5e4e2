//! Typed node configuration.
//!
//! Every algorithmic knob is required; there are no defaults baked into the
//! services. Only `squads` is optional (absent = no milestones announced).

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::LoadedConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSection {
    /// This node's id: HLC node component and its own CRDT slot.
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumSection {
    pub leader_region: String,
    pub standby_region: String,
    pub heartbeat_threshold_seconds: f64,
    /// Watchdog polling interval for `check_integrity`.
    pub poll_interval_ms: u64,
}

impl QuorumSection {
    /// Errors for non-positive, non-finite or unrepresentable thresholds.
    pub fn heartbeat_threshold(&self) -> Result<Duration> {
        let secs = self.heartbeat_threshold_seconds;
        match Duration::try_from_secs_f64(secs) {
            Ok(d) if !d.is_zero() => Ok(d),
            _ => bail!("CONFIG_INVALID /quorum/heartbeat_threshold_seconds must be > 0 and representable, got {secs}"),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Total OCC attempts per order (first try included).
    pub max_occ_retries: u32,
    /// `[min, max]` commit-wait in milliseconds; equal bounds = fixed wait.
    pub commit_wait_bounds_ms: [u64; 2],
    /// `[min, max]` jittered conflict backoff in milliseconds.
    pub backoff_bounds_ms: [u64; 2],
    /// Committed versions retained per SKU for exact-staleness reads.
    pub snapshot_history: usize,
    /// SKUs seeded at startup with their opening stock.
    #[serde(default)]
    pub skus: BTreeMap<String, i64>,
}

impl LedgerSection {
    pub fn commit_wait_bounds(&self) -> (Duration, Duration) {
        bounds(self.commit_wait_bounds_ms)
    }

    pub fn backoff_bounds(&self) -> (Duration, Duration) {
        bounds(self.backoff_bounds_ms)
    }
}

fn bounds(ms: [u64; 2]) -> (Duration, Duration) {
    (Duration::from_millis(ms[0]), Duration::from_millis(ms[1]))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySection {
    /// Opening value of the replicated stock counter, credited to this node's slot.
    pub initial_stock: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquadSection {
    /// Participant counts that announce a milestone (strictly increasing).
    #[serde(default)]
    pub milestones: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub quorum: QuorumSection,
    pub ledger: LedgerSection,
    pub inventory: InventorySection,
    #[serde(default)]
    pub squads: SquadSection,
}

impl NodeConfig {
    /// Typed view of a loaded (merged, hashed) config.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: NodeConfig = serde_json::from_value(loaded.config_json.clone())
            .context("CONFIG_INVALID: node config does not match schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.node_id.trim().is_empty() {
            bail!("CONFIG_INVALID /node/node_id must not be empty");
        }

        let q = &self.quorum;
        if q.leader_region.trim().is_empty() || q.standby_region.trim().is_empty() {
            bail!("CONFIG_INVALID /quorum leader_region and standby_region are required");
        }
        if q.leader_region == q.standby_region {
            bail!(
                "CONFIG_INVALID /quorum leader and standby must differ (both '{}')",
                q.leader_region
            );
        }
        q.heartbeat_threshold()?;
        if q.poll_interval_ms == 0 {
            bail!("CONFIG_INVALID /quorum/poll_interval_ms must be > 0");
        }

        let l = &self.ledger;
        if l.max_occ_retries == 0 {
            bail!("CONFIG_INVALID /ledger/max_occ_retries must be >= 1");
        }
        check_bounds("/ledger/commit_wait_bounds_ms", l.commit_wait_bounds_ms)?;
        check_bounds("/ledger/backoff_bounds_ms", l.backoff_bounds_ms)?;
        if l.snapshot_history == 0 {
            bail!("CONFIG_INVALID /ledger/snapshot_history must be >= 1");
        }
        for (sku, stock) in &l.skus {
            if sku.trim().is_empty() {
                bail!("CONFIG_INVALID /ledger/skus contains an empty SKU");
            }
            if *stock < 0 {
                bail!("CONFIG_INVALID /ledger/skus/{sku} opening stock must be >= 0, got {stock}");
            }
        }

        let m = &self.squads.milestones;
        if m.first() == Some(&0) {
            bail!("CONFIG_INVALID /squads/milestones must be > 0");
        }
        if m.windows(2).any(|w| w[0] >= w[1]) {
            bail!("CONFIG_INVALID /squads/milestones must be strictly increasing: {m:?}");
        }

        Ok(())
    }
}

fn check_bounds(ptr: &str, b: [u64; 2]) -> Result<()> {
    if b[0] > b[1] {
        bail!("CONFIG_INVALID {ptr} min {} > max {}", b[0], b[1]);
    }
    Ok(())
}
