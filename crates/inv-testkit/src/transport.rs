use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use inv_reconcile::{DeltaSet, ReconcileService, ReplicaClient};

/// Unreliable link between a replica and the server. Each message is dropped
/// with probability `drop_rate`; the seed makes a run reproducible.
pub struct LossyTransport {
    rng: StdRng,
    drop_rate: f64,
    pub sent: u64,
    pub dropped: u64,
}

impl LossyTransport {
    /// Finite rates outside `[0, 1]` are clamped; NaN and infinities are rejected.
    pub fn new(drop_rate: f64, seed: u64) -> Result<Self> {
        if !drop_rate.is_finite() {
            bail!("drop rate must be a finite probability, got {drop_rate}");
        }
        Ok(Self::with_rate(drop_rate.clamp(0.0, 1.0), seed))
    }

    pub fn reliable() -> Self {
        Self::with_rate(0.0, 0)
    }

    fn with_rate(drop_rate: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            drop_rate,
            sent: 0,
            dropped: 0,
        }
    }

    pub fn deliver<T>(&mut self, msg: T) -> Option<T> {
        self.sent += 1;
        if self.rng.gen_bool(self.drop_rate) {
            self.dropped += 1;
            None
        } else {
            Some(msg)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRounds {
    pub rounds: u32,
    pub requests_lost: u32,
    pub responses_lost: u32,
}

/// Resend the replica's full state until the server's confirmation arrives
/// and the replica has nothing pending.
pub fn sync_until_confirmed(
    server: &ReconcileService,
    replica: &mut ReplicaClient,
    link: &mut LossyTransport,
    max_rounds: u32,
) -> Result<SyncRounds> {
    let mut out = SyncRounds::default();
    while out.rounds < max_rounds {
        out.rounds += 1;

        let Some(req) = link.deliver(replica.sync_request()) else {
            out.requests_lost += 1;
            continue;
        };
        let deltas = DeltaSet::from_request(&req)?;
        let resp = server
            .handle_sync(&req.node_id, &deltas, &req.remote_ts)
            .into_response();

        let Some(resp) = link.deliver(resp) else {
            out.responses_lost += 1;
            continue;
        };
        replica.confirm(&resp)?;
        if replica.is_synced() {
            return Ok(out);
        }
    }
    bail!(
        "replica {} not confirmed after {max_rounds} rounds ({} requests lost, {} responses lost)",
        replica.node_id(),
        out.requests_lost,
        out.responses_lost
    )
}
