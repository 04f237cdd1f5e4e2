//! inv-ledger
//!
//! Strongly consistent per-SKU stock ledger for flash sales.
//!
//! Architectural decisions:
//! - Optimistic concurrency: read `(stock, version)` without holding a lock,
//!   commit-wait, then validate and write under the record's own lock
//! - Validation rejects a changed version and any commit timestamp that does
//!   not strictly follow the record's last commit
//! - Retries are bounded by an explicit [`RetryPolicy`]; exhaustion reports
//!   `HIGH_CONTENTION` and never leaves a partial write
//! - Sold out is a terminal outcome, never retried
//! - The only suspension points are the commit-wait and backoff sleeps; no
//!   lock is held across them, so dropping an in-flight order is always safe
//! - Each record keeps a bounded history of committed versions for
//!   exact-staleness reads

mod commit_wait;
mod error;
mod ledger;
mod record;
mod retry;

pub use commit_wait::CommitWait;
pub use error::LedgerError;
pub use ledger::{Committed, Ledger, LedgerSettings, OrderOutcome, StaleRead};
pub use record::{RecordView, Snapshot};
pub use retry::{Attempt, Backoff, Retried, RetryPolicy};
