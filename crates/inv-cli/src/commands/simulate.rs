use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use inv_clock::HybridClock;
use inv_config::NodeConfig;
use inv_ledger::{Backoff, CommitWait, Ledger, LedgerSettings, OrderOutcome, RetryPolicy};
use inv_quorum::{QuorumConfig, QuorumMonitor};
use inv_reconcile::{ReconcileService, ReplicaClient};
use inv_testkit::{sync_until_confirmed, LossyTransport, ManualClock, FIXTURE_START_NANOS};

use super::KvReport;

// ---------------------------------------------------------------------------
// simulate partition
// ---------------------------------------------------------------------------

pub struct PartitionArgs {
    pub drop_rate: f64,
    pub seed: u64,
    pub initial_stock: u64,
    pub sale_a: u64,
    pub sale_b: u64,
    pub max_rounds: u32,
}

#[derive(Debug)]
pub struct PartitionReport {
    pub expected: i64,
    pub final_stock: i64,
    pub replica_a_view: i64,
    pub replica_b_view: i64,
    pub rounds: u32,
    pub requests_lost: u32,
    pub responses_lost: u32,
}

impl PartitionReport {
    pub fn passed(&self) -> bool {
        self.final_stock == self.expected
            && self.replica_a_view == self.expected
            && self.replica_b_view == self.expected
    }
}

impl KvReport for PartitionReport {
    fn kv(&self) -> Vec<(&'static str, String)> {
        vec![
            ("expected_stock", self.expected.to_string()),
            ("final_stock", self.final_stock.to_string()),
            ("replica_a_view", self.replica_a_view.to_string()),
            ("replica_b_view", self.replica_b_view.to_string()),
            ("sync_rounds", self.rounds.to_string()),
            ("requests_lost", self.requests_lost.to_string()),
            ("responses_lost", self.responses_lost.to_string()),
            ("result", pass_fail(self.passed())),
        ]
    }
}

pub fn partition(args: &PartitionArgs) -> Result<PartitionReport> {
    let sold = args
        .sale_a
        .checked_add(args.sale_b)
        .context("combined sales overflow u64")?;
    let expected = i64::try_from(args.initial_stock).context("initial stock out of range")?
        - i64::try_from(sold).context("sales out of range")?;
    let mut link_a = LossyTransport::new(args.drop_rate, args.seed)?;
    let mut link_b = LossyTransport::new(args.drop_rate, args.seed.wrapping_add(1))?;

    let server = ReconcileService::new(
        Arc::new(HybridClock::new("server-virginia")),
        args.initial_stock,
        Vec::new(),
    )?;
    let mut a = ReplicaClient::new(Arc::new(HybridClock::new("node-a")));
    let mut b = ReplicaClient::new(Arc::new(HybridClock::new("node-b")));
    if args.sale_a > 0 {
        a.record_sale(args.sale_a)?;
    }
    if args.sale_b > 0 {
        b.record_sale(args.sale_b)?;
    }

    let ra = sync_until_confirmed(&server, &mut a, &mut link_a, args.max_rounds)?;
    let rb = sync_until_confirmed(&server, &mut b, &mut link_b, args.max_rounds)?;
    // A syncs again so it learns B's sale.
    let ra2 = sync_until_confirmed(&server, &mut a, &mut link_a, args.max_rounds)?;

    Ok(PartitionReport {
        expected,
        final_stock: server.current_value(),
        replica_a_view: a.estimated_stock(),
        replica_b_view: b.estimated_stock(),
        rounds: ra.rounds + rb.rounds + ra2.rounds,
        requests_lost: ra.requests_lost + rb.requests_lost + ra2.requests_lost,
        responses_lost: ra.responses_lost + rb.responses_lost + ra2.responses_lost,
    })
}

// ---------------------------------------------------------------------------
// simulate blackout
// ---------------------------------------------------------------------------

pub struct BlackoutReport {
    pub leader: String,
    pub standby: String,
    pub threshold_secs: f64,
    pub detected_after_ms: u128,
    pub leader_during_failover: String,
    pub recovered: bool,
}

impl KvReport for BlackoutReport {
    fn kv(&self) -> Vec<(&'static str, String)> {
        vec![
            ("leader", self.leader.clone()),
            ("standby", self.standby.clone()),
            ("threshold_secs", self.threshold_secs.to_string()),
            ("failover_detected_after_ms", self.detected_after_ms.to_string()),
            ("leader_during_failover", self.leader_during_failover.clone()),
            ("recovered", self.recovered.to_string()),
        ]
    }
}

/// `threshold_secs` overrides the configured failover threshold.
pub fn blackout(
    cfg: &NodeConfig,
    threshold_secs: Option<f64>,
    step_ms: u64,
) -> Result<BlackoutReport> {
    let threshold_secs = threshold_secs.unwrap_or(cfg.quorum.heartbeat_threshold_seconds);
    let threshold = Duration::try_from_secs_f64(threshold_secs)
        .ok()
        .filter(|d| !d.is_zero())
        .with_context(|| format!("threshold must be > 0 seconds, got {threshold_secs}"))?;
    if step_ms == 0 {
        bail!("step must be > 0 ms");
    }
    let step = Duration::from_millis(step_ms);

    let wall = Arc::new(ManualClock::new(FIXTURE_START_NANOS));
    let monitor = QuorumMonitor::with_clock(
        QuorumConfig {
            leader_region: cfg.quorum.leader_region.clone(),
            standby_region: cfg.quorum.standby_region.clone(),
            heartbeat_threshold: threshold,
        },
        wall.clone(),
    );

    // Steady state: leader heartbeats every second.
    for _ in 0..3 {
        wall.advance(Duration::from_secs(1));
        monitor.register_heartbeat(&cfg.quorum.leader_region);
        if monitor.check_integrity().failover_active {
            bail!("failover during steady state (threshold {threshold_secs}s too small?)");
        }
    }

    // Blackout: poll until the monitor notices.
    let max_steps = threshold.as_millis() / step.as_millis().max(1) + 2;
    let mut failover = None;
    for _ in 0..max_steps {
        wall.advance(step);
        let status = monitor.check_integrity();
        if status.failover_active {
            failover = Some(status);
            break;
        }
    }
    let Some(failover) = failover else {
        bail!("no failover after {max_steps} polls");
    };

    let hb = monitor.register_heartbeat(&cfg.quorum.leader_region);
    let recovered = hb.transition.is_some() && !monitor.check_integrity().failover_active;

    Ok(BlackoutReport {
        leader: cfg.quorum.leader_region.clone(),
        standby: cfg.quorum.standby_region.clone(),
        threshold_secs,
        detected_after_ms: failover.elapsed.as_millis(),
        leader_during_failover: failover.leader,
        recovered,
    })
}

// ---------------------------------------------------------------------------
// simulate flash-sale
// ---------------------------------------------------------------------------

pub struct FlashSaleReport {
    pub stock: i64,
    pub buyers: usize,
    pub successes: usize,
    pub sold_out: usize,
    pub high_contention: usize,
    pub final_stock: i64,
    pub final_version: u64,
}

impl FlashSaleReport {
    pub fn passed(&self) -> bool {
        let sold = self.successes as i64;
        self.final_stock >= 0
            && sold <= self.stock
            && self.final_stock == self.stock - sold
            && self.final_version == 1 + self.successes as u64
    }
}

impl KvReport for FlashSaleReport {
    fn kv(&self) -> Vec<(&'static str, String)> {
        vec![
            ("stock", self.stock.to_string()),
            ("buyers", self.buyers.to_string()),
            ("successes", self.successes.to_string()),
            ("sold_out", self.sold_out.to_string()),
            ("high_contention", self.high_contention.to_string()),
            ("final_stock", self.final_stock.to_string()),
            ("final_version", self.final_version.to_string()),
            ("invariant", pass_fail(self.passed())),
        ]
    }
}

const FLASH_SKU: &str = "SKU-EXCLUSIVE-B";

/// `retries` overrides the configured attempt budget.
pub async fn flash_sale(
    cfg: &NodeConfig,
    stock: i64,
    buyers: usize,
    retries: Option<u32>,
    seed: Option<u64>,
) -> Result<FlashSaleReport> {
    let retries = retries.unwrap_or(cfg.ledger.max_occ_retries);
    if retries == 0 {
        bail!("retries must be >= 1");
    }
    let (wait_min, wait_max) = cfg.ledger.commit_wait_bounds();
    let (backoff_min, backoff_max) = cfg.ledger.backoff_bounds();
    let ledger = Arc::new(Ledger::new(
        Arc::new(HybridClock::new("server-virginia")),
        LedgerSettings {
            retry: RetryPolicy::new(
                retries,
                Backoff::Jittered {
                    min: backoff_min,
                    max: backoff_max,
                },
            ),
            commit_wait: CommitWait::from_bounds(wait_min, wait_max),
            snapshot_history: cfg.ledger.snapshot_history,
            seed,
        },
    ));
    ledger.register_sku(FLASH_SKU, stock)?;

    let mut handles = Vec::with_capacity(buyers);
    for _ in 0..buyers {
        let l = Arc::clone(&ledger);
        handles.push(tokio::spawn(
            async move { l.execute_order(FLASH_SKU, 1, None).await },
        ));
    }

    let mut report = FlashSaleReport {
        stock,
        buyers,
        successes: 0,
        sold_out: 0,
        high_contention: 0,
        final_stock: 0,
        final_version: 0,
    };
    for h in handles {
        match h.await.context("buyer task panicked")?? {
            OrderOutcome::Success(_) => report.successes += 1,
            OrderOutcome::SoldOut { .. } => report.sold_out += 1,
            OrderOutcome::HighContention { .. } => report.high_contention += 1,
            OrderOutcome::NotFound => bail!("{FLASH_SKU} vanished mid-sale"),
        }
    }

    let rec = ledger
        .record(FLASH_SKU)
        .with_context(|| format!("{FLASH_SKU} missing after sale"))?;
    report.final_stock = rec.stock;
    report.final_version = rec.version;
    Ok(report)
}

fn pass_fail(ok: bool) -> String {
    if ok { "PASS" } else { "FAIL" }.to_string()
}
