//! inv-clock
//!
//! Hybrid Logical Clock for the inventory core.
//!
//! Architectural decisions:
//! - Every local and remote event is stamped with `(physical, logical, node_id)`
//! - One node's timestamps strictly increase in `(physical, logical)` order
//! - Merging a remote reading never moves the local clock backwards
//! - Wall-clock time is injected (`PhysicalClock`) so tests and simulations
//!   can drive time by hand

mod hlc;
mod physical;

pub use hlc::{HybridClock, Timestamp};
pub use physical::{ManualClock, PhysicalClock, SystemClock};

/// Nanoseconds per millisecond, for callers converting config values.
pub const NANOS_PER_MILLI: u64 = 1_000_000;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;
