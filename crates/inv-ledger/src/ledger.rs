use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use inv_clock::{HybridClock, Timestamp};
use inv_schemas::{BuyResponse, BuyStatus, ReadMode, StockReadResponse};

use crate::commit_wait::CommitWait;
use crate::error::LedgerError;
use crate::record::{Record, RecordView};
use crate::retry::{Attempt, Retried, RetryPolicy};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A successfully committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committed {
    pub tx_id: Uuid,
    pub sku: String,
    pub version: u64,
    pub commit_ts: Timestamp,
    pub stock_after: i64,
    pub attempts: u32,
    pub commit_wait: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Success(Committed),
    /// Not enough stock at read time. Never retried.
    SoldOut { available: i64, attempts: u32 },
    /// Every attempt lost a race; nothing was written.
    HighContention { attempts: u32 },
    NotFound,
}

impl OrderOutcome {
    pub fn status(&self) -> BuyStatus {
        match self {
            OrderOutcome::Success(_) => BuyStatus::Success,
            OrderOutcome::SoldOut { .. } => BuyStatus::SoldOut,
            OrderOutcome::HighContention { .. } => BuyStatus::HighContention,
            OrderOutcome::NotFound => BuyStatus::NotFound,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OrderOutcome::Success(_))
    }

    pub fn into_response(self) -> BuyResponse {
        let status = self.status();
        match self {
            OrderOutcome::Success(c) => BuyResponse {
                status,
                tx_id: Some(c.tx_id),
                version: Some(c.version),
                commit_ts: Some(c.commit_ts),
                attempts: c.attempts,
                commit_wait_ms: Some(c.commit_wait.as_nanos() as f64 / 1_000_000.0),
                reason: None,
            },
            OrderOutcome::SoldOut { available, attempts } => BuyResponse {
                status,
                tx_id: None,
                version: None,
                commit_ts: None,
                attempts,
                commit_wait_ms: None,
                reason: Some(format!("insufficient stock: {available} available")),
            },
            OrderOutcome::HighContention { attempts } => BuyResponse {
                status,
                tx_id: None,
                version: None,
                commit_ts: None,
                attempts,
                commit_wait_ms: None,
                reason: Some("high contention, retry later".to_string()),
            },
            OrderOutcome::NotFound => BuyResponse {
                status,
                tx_id: None,
                version: None,
                commit_ts: None,
                attempts: 0,
                commit_wait_ms: None,
                reason: Some("sku not found".to_string()),
            },
        }
    }
}

/// An exact-staleness read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleRead {
    pub sku: String,
    pub mode: ReadMode,
    pub stock: i64,
    pub version: u64,
    pub commit_ts: Timestamp,
}

impl StaleRead {
    pub fn into_response(self) -> StockReadResponse {
        StockReadResponse {
            sku: self.sku,
            mode: self.mode,
            stock: self.stock,
            served_version: self.version,
            commit_ts: self.commit_ts,
        }
    }
}

/// Terminal result of one attempt, before attempt counting is attached.
enum Terminal {
    Committed {
        version: u64,
        commit_ts: Timestamp,
        stock_after: i64,
        commit_wait: Duration,
    },
    SoldOut {
        available: i64,
    },
    NotFound,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub retry: RetryPolicy,
    pub commit_wait: CommitWait,
    /// Committed versions retained per SKU.
    pub snapshot_history: usize,
    /// Seed for backoff and commit-wait jitter; `None` seeds from the OS.
    pub seed: Option<u64>,
}

pub struct Ledger {
    clock: Arc<HybridClock>,
    records: RwLock<BTreeMap<String, Arc<Mutex<Record>>>>,
    retry: RetryPolicy,
    commit_wait: CommitWait,
    snapshot_history: usize,
    rng: Mutex<StdRng>,
}

impl Ledger {
    pub fn new(clock: Arc<HybridClock>, settings: LedgerSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            clock,
            records: RwLock::new(BTreeMap::new()),
            retry: settings.retry,
            commit_wait: settings.commit_wait,
            snapshot_history: settings.snapshot_history,
            rng: Mutex::new(rng),
        }
    }

    pub fn register_sku(&self, sku: &str, stock: i64) -> Result<(), LedgerError> {
        if sku.trim().is_empty() {
            return Err(LedgerError::EmptySku);
        }
        if stock < 0 {
            return Err(LedgerError::NegativeStock {
                sku: sku.to_string(),
                stock,
            });
        }
        let mut records = self.records.write();
        if records.contains_key(sku) {
            return Err(LedgerError::SkuExists {
                sku: sku.to_string(),
            });
        }
        let record = Record::new(
            sku.to_string(),
            stock,
            self.clock.now(),
            self.snapshot_history,
        );
        records.insert(sku.to_string(), Arc::new(Mutex::new(record)));
        tracing::info!(sku, stock, "ledger_sku_registered");
        Ok(())
    }

    pub fn skus(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    pub fn stock(&self, sku: &str) -> Option<i64> {
        let record = self.lookup(sku)?;
        let stock = record.lock().stock();
        Some(stock)
    }

    pub fn record(&self, sku: &str) -> Option<RecordView> {
        let record = self.lookup(sku)?;
        let view = record.lock().view();
        Some(view)
    }

    /// Add stock as a new committed version.
    pub fn restock(&self, sku: &str, quantity: i64) -> Result<RecordView, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity { quantity });
        }
        let record = self.lookup(sku).ok_or_else(|| LedgerError::UnknownSku {
            sku: sku.to_string(),
        })?;
        let mut rec = record.lock();
        let commit_ts = self.clock.now();
        let version = rec.commit(quantity, commit_ts);
        tracing::info!(sku, quantity, version, stock = rec.stock(), "ledger_restocked");
        Ok(rec.view())
    }

    /// Buy `quantity` units of `sku` under optimistic concurrency.
    ///
    /// `uncertainty` overrides the configured commit-wait with `2 * uncertainty`.
    pub async fn execute_order(
        &self,
        sku: &str,
        quantity: i64,
        uncertainty: Option<Duration>,
    ) -> Result<OrderOutcome, LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::InvalidQuantity { quantity });
        }

        let run = self
            .retry
            .run(&self.rng, move |attempt| {
                self.attempt_order(sku, quantity, uncertainty, attempt)
            })
            .await;

        let outcome = match run {
            Retried::Done {
                value:
                    Terminal::Committed {
                        version,
                        commit_ts,
                        stock_after,
                        commit_wait,
                    },
                attempts,
            } => OrderOutcome::Success(Committed {
                tx_id: Uuid::new_v4(),
                sku: sku.to_string(),
                version,
                commit_ts,
                stock_after,
                attempts,
                commit_wait,
            }),
            Retried::Done {
                value: Terminal::SoldOut { available },
                attempts,
            } => OrderOutcome::SoldOut {
                available,
                attempts,
            },
            Retried::Done {
                value: Terminal::NotFound,
                ..
            } => OrderOutcome::NotFound,
            Retried::Exhausted { attempts } => {
                tracing::warn!(sku, quantity, attempts, "ledger_high_contention");
                OrderOutcome::HighContention { attempts }
            }
        };
        Ok(outcome)
    }

    /// Read as of `now - staleness`. Zero staleness is a strong read of the
    /// latest committed version.
    pub fn read_stale(&self, sku: &str, staleness: Duration) -> Result<StaleRead, LedgerError> {
        let record = self.lookup(sku).ok_or_else(|| LedgerError::UnknownSku {
            sku: sku.to_string(),
        })?;

        if staleness.is_zero() {
            let snap = record.lock().current();
            return Ok(StaleRead {
                sku: sku.to_string(),
                mode: ReadMode::StrongRead,
                stock: snap.stock,
                version: snap.version,
                commit_ts: snap.commit_ts,
            });
        }

        let now = self.clock.now();
        let staleness_nanos = staleness.as_nanos().min(u64::MAX as u128) as u64;
        let cutoff = now.physical.saturating_sub(staleness_nanos);
        let snap = record.lock().as_of(cutoff);
        Ok(StaleRead {
            sku: sku.to_string(),
            mode: ReadMode::StaleRead,
            stock: snap.stock,
            version: snap.version,
            commit_ts: snap.commit_ts,
        })
    }

    fn lookup(&self, sku: &str) -> Option<Arc<Mutex<Record>>> {
        self.records.read().get(sku).cloned()
    }

    async fn attempt_order(
        &self,
        sku: &str,
        quantity: i64,
        uncertainty: Option<Duration>,
        attempt: u32,
    ) -> Attempt<Terminal> {
        let Some(record) = self.lookup(sku) else {
            return Attempt::Done(Terminal::NotFound);
        };

        // Read phase.
        let (read_stock, read_version) = {
            let rec = record.lock();
            (rec.stock(), rec.version())
        };
        if read_stock < quantity {
            return Attempt::Done(Terminal::SoldOut {
                available: read_stock,
            });
        }

        // Commit-wait.
        let wait = match uncertainty {
            Some(eps) => CommitWait::for_uncertainty(eps),
            None => {
                let mut rng = self.rng.lock();
                self.commit_wait.sample(&mut *rng)
            }
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        // Validate + write, atomically under the record lock.
        let mut rec = record.lock();
        let commit_ts = self.clock.now();
        if rec.version() != read_version || commit_ts <= *rec.last_commit_ts() {
            tracing::debug!(
                sku,
                attempt,
                read_version,
                current_version = rec.version(),
                "ledger_occ_conflict"
            );
            return Attempt::Conflict;
        }
        if rec.stock() < quantity {
            return Attempt::Done(Terminal::SoldOut {
                available: rec.stock(),
            });
        }

        let version = rec.commit(-quantity, commit_ts.clone());
        tracing::debug!(sku, quantity, version, attempt, commit_ts = %commit_ts, "ledger_committed");
        Attempt::Done(Terminal::Committed {
            version,
            commit_ts,
            stock_after: rec.stock(),
            commit_wait: wait,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use inv_clock::{ManualClock, NANOS_PER_SEC};

    fn ledger(attempts: u32) -> Ledger {
        let wall = Arc::new(ManualClock::new(10 * NANOS_PER_SEC));
        Ledger::new(
            Arc::new(HybridClock::with_physical("ledger", wall)),
            LedgerSettings {
                retry: RetryPolicy::new(attempts, Backoff::None),
                commit_wait: CommitWait::None,
                snapshot_history: 8,
                seed: Some(1),
            },
        )
    }

    #[tokio::test]
    async fn commit_ts_not_after_last_commit_is_a_conflict() {
        let l = ledger(2);
        l.register_sku("S", 5).unwrap();
        // A commit stamped far ahead of this node's clock.
        let future = Timestamp::new(u64::MAX / 2, 0, "other");
        l.lookup("S").unwrap().lock().commit(0, future);

        let out = l.execute_order("S", 1, None).await.unwrap();
        assert_eq!(out, OrderOutcome::HighContention { attempts: 2 });
        assert_eq!(l.stock("S"), Some(5));
    }

    #[tokio::test]
    async fn invalid_quantity_is_an_error_not_an_outcome() {
        let l = ledger(3);
        l.register_sku("S", 5).unwrap();
        assert_eq!(
            l.execute_order("S", 0, None).await,
            Err(LedgerError::InvalidQuantity { quantity: 0 })
        );
        assert_eq!(
            l.restock("S", -2),
            Err(LedgerError::InvalidQuantity { quantity: -2 })
        );
    }

    #[test]
    fn failure_responses_have_reason_and_no_tx_id() {
        for o in [
            OrderOutcome::SoldOut {
                available: 0,
                attempts: 1,
            },
            OrderOutcome::HighContention { attempts: 3 },
            OrderOutcome::NotFound,
        ] {
            let status = o.status();
            let r = o.into_response();
            assert_eq!(r.status, status);
            assert!(r.tx_id.is_none());
            assert!(r.reason.is_some());
        }
    }
}
