//! inv-quorum
//!
//! Leader liveness and failover for a two-region quorum.
//!
//! Architectural decisions:
//! - Two states, HEALTHY and FAILOVER_ACTIVE; boot is HEALTHY with the
//!   heartbeat clock started at construction
//! - Only the configured leader region's heartbeats count (exact match);
//!   other regions are acknowledged and ignored
//! - Silence strictly longer than the threshold promotes the standby
//! - The next leader heartbeat restores the leader
//! - Transitions are returned as values and logged, never raised as errors
//!
//! `engine` is pure deterministic logic taking `now` from the caller.
//! `QuorumMonitor` wraps it with a lock and an injected physical clock.

mod engine;
mod monitor;
mod types;

pub use engine::{evaluate_heartbeat, evaluate_staleness};
pub use monitor::QuorumMonitor;
pub use types::*;
