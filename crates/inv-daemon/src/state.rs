//! Shared node state for inv-daemon.
//!
//! `NodeHost` owns every service instance a node runs. It is built once from
//! a validated [`NodeConfig`] and shared behind an `Arc`; nothing here is
//! global.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use inv_clock::{HybridClock, PhysicalClock, SystemClock, Timestamp};
use inv_config::NodeConfig;
use inv_ledger::{Backoff, CommitWait, Ledger, LedgerSettings, RetryPolicy};
use inv_quorum::{QuorumConfig, QuorumMonitor, QuorumStatus, QuorumTransition};
use inv_reconcile::ReconcileService;
use inv_schemas::BuyStatus;

// ---------------------------------------------------------------------------
// BusMsg: node event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the node's internal event bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    Quorum {
        ts_millis: i64,
        transition: QuorumTransition,
    },
    Synced {
        from: String,
        current_stock: i64,
        server_ts: Timestamp,
    },
    Order {
        sku: String,
        status: BuyStatus,
        tx_id: Option<Uuid>,
        version: Option<u64>,
    },
}

// ---------------------------------------------------------------------------
// BuildInfo / NodeStatus
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Point-in-time snapshot of the node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: String,
    pub uptime_secs: u64,
    pub config_hash: Option<String>,
    pub current_stock: i64,
    pub skus: Vec<String>,
    pub quorum: QuorumStatus,
}

// ---------------------------------------------------------------------------
// NodeHost
// ---------------------------------------------------------------------------

pub struct NodeHost {
    pub config: NodeConfig,
    pub config_hash: Option<String>,
    pub build: BuildInfo,
    /// Broadcast bus for node events.
    pub bus: broadcast::Sender<BusMsg>,
    pub clock: Arc<HybridClock>,
    pub reconcile: Arc<ReconcileService>,
    pub ledger: Arc<Ledger>,
    pub quorum: Arc<QuorumMonitor>,
}

impl NodeHost {
    pub fn new(config: NodeConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock), None)
    }

    /// Build every service on a shared physical clock. `seed` fixes the ledger's
    /// jitter for reproducible runs.
    pub fn with_clock(
        config: NodeConfig,
        wall: Arc<dyn PhysicalClock>,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;

        let clock = Arc::new(HybridClock::with_physical(
            config.node.node_id.clone(),
            Arc::clone(&wall),
        ));

        let reconcile = Arc::new(
            ReconcileService::new(
                Arc::clone(&clock),
                config.inventory.initial_stock,
                config.squads.milestones.clone(),
            )
            .context("seeding inventory counter")?,
        );

        let ledger = Arc::new(Ledger::new(
            Arc::clone(&clock),
            ledger_settings(&config, seed),
        ));
        for (sku, stock) in &config.ledger.skus {
            ledger
                .register_sku(sku, *stock)
                .with_context(|| format!("seeding ledger sku {sku}"))?;
        }

        let quorum = Arc::new(QuorumMonitor::with_clock(
            QuorumConfig {
                leader_region: config.quorum.leader_region.clone(),
                standby_region: config.quorum.standby_region.clone(),
                heartbeat_threshold: config.quorum.heartbeat_threshold()?,
            },
            wall,
        ));

        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        tracing::info!(
            node_id = %config.node.node_id,
            initial_stock = config.inventory.initial_stock,
            skus = config.ledger.skus.len(),
            leader = %config.quorum.leader_region,
            "node_host_created"
        );

        Ok(Self {
            config,
            config_hash: None,
            build: BuildInfo {
                service: "inv-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            bus,
            clock,
            reconcile,
            ledger,
            quorum,
        })
    }

    /// Record the hash of the configuration this node was built from.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMsg> {
        self.bus.subscribe()
    }

    /// Send on the bus; no subscribers is not an error.
    pub fn publish(&self, msg: BusMsg) {
        let _ = self.bus.send(msg);
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.config.node.node_id.clone(),
            uptime_secs: uptime_secs(),
            config_hash: self.config_hash.clone(),
            current_stock: self.reconcile.current_value(),
            skus: self.ledger.skus(),
            quorum: self.check_quorum(),
        }
    }

    /// Evaluate leader liveness now, publishing any transition on the bus.
    pub fn check_quorum(&self) -> QuorumStatus {
        let status = self.quorum.check_integrity();
        if let Some(t) = &status.transition {
            self.publish(BusMsg::Quorum {
                ts_millis: now_millis(),
                transition: t.clone(),
            });
        }
        status
    }
}

fn ledger_settings(config: &NodeConfig, seed: Option<u64>) -> LedgerSettings {
    let (wait_min, wait_max) = config.ledger.commit_wait_bounds();
    let (backoff_min, backoff_max) = config.ledger.backoff_bounds();
    LedgerSettings {
        retry: RetryPolicy::new(
            config.ledger.max_occ_retries,
            Backoff::Jittered {
                min: backoff_min,
                max: backoff_max,
            },
        ),
        commit_wait: CommitWait::from_bounds(wait_min, wait_max),
        snapshot_history: config.ledger.snapshot_history,
        seed,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Millisecond `f64` from the wire to a `Duration`, rejecting nonsense.
pub(crate) fn duration_from_ms(ms: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(ms / 1_000.0).ok()
}
