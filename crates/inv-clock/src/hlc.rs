//! Hybrid Logical Clock.
//!
//! # Invariants
//!
//! - **Local monotonicity**: successive `now()` calls on one clock return
//!   strictly increasing `(physical, logical)` pairs, even if the injected
//!   wall clock stalls or steps backwards.
//! - **Causal dominance**: `update(remote)` returns a timestamp strictly
//!   greater than both the prior local reading and `remote`.
//! - **Never backwards**: the stored physical component is only ever replaced
//!   by a larger-or-equal value.
//!
//! The logical counter is a `u32`. On overflow the physical component is
//! pushed forward by one nanosecond and the counter restarts at 0, which keeps
//! every invariant above.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::physical::{PhysicalClock, SystemClock};

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// An HLC reading.
///
/// Ordered by `(physical, logical)`; `node_id` only breaks exact ties so the
/// order is total and deterministic across nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Wall-clock component, nanoseconds.
    pub physical: u64,
    /// Logical counter within one physical value.
    pub logical: u32,
    /// Issuing node.
    #[serde(rename = "node", alias = "node_id")]
    pub node_id: String,
}

impl Timestamp {
    pub fn new<S: Into<String>>(physical: u64, logical: u32, node_id: S) -> Self {
        Self {
            physical,
            logical,
            node_id: node_id.into(),
        }
    }

    /// The genesis reading for a node (orders before every issued timestamp).
    pub fn zero<S: Into<String>>(node_id: S) -> Self {
        Self::new(0, 0, node_id)
    }

    /// `(physical, logical)` pair, ignoring the node tie-break.
    pub fn tuple(&self) -> (u64, u32) {
        (self.physical, self.logical)
    }

    /// `true` if `self` is strictly after `other` in `(physical, logical)` order.
    pub fn happened_after(&self, other: &Timestamp) -> bool {
        self.tuple() > other.tuple()
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.physical
            .cmp(&other.physical)
            .then_with(|| self.logical.cmp(&other.logical))
            .then_with(|| self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}@{}", self.physical, self.logical, self.node_id)
    }
}

// ---------------------------------------------------------------------------
// HybridClock
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ClockState {
    physical: u64,
    logical: u32,
}

/// Increment the logical counter, carrying into physical on overflow.
fn bump(physical: u64, logical: u32) -> (u64, u32) {
    match logical.checked_add(1) {
        Some(l) => (physical, l),
        None => (physical.saturating_add(1), 0),
    }
}

/// Thread-safe HLC owned by one node.
///
/// All reads and updates go through one mutex; callers on different threads
/// serialize on it. Share with `Arc<HybridClock>`.
pub struct HybridClock {
    node_id: String,
    wall: Arc<dyn PhysicalClock>,
    state: Mutex<ClockState>,
}

impl fmt::Debug for HybridClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state.lock();
        f.debug_struct("HybridClock")
            .field("node_id", &self.node_id)
            .field("physical", &st.physical)
            .field("logical", &st.logical)
            .finish()
    }
}

impl HybridClock {
    /// Clock backed by the system wall clock.
    pub fn new<S: Into<String>>(node_id: S) -> Self {
        Self::with_physical(node_id, Arc::new(SystemClock))
    }

    /// Clock backed by an injected wall clock.
    pub fn with_physical<S: Into<String>>(node_id: S, wall: Arc<dyn PhysicalClock>) -> Self {
        Self {
            node_id: node_id.into(),
            wall,
            state: Mutex::new(ClockState::default()),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Stamp a local event.
    pub fn now(&self) -> Timestamp {
        let wall = self.wall.now_nanos();
        let mut st = self.state.lock();

        if wall > st.physical {
            st.physical = wall;
            st.logical = 0;
        } else {
            (st.physical, st.logical) = bump(st.physical, st.logical);
        }

        self.stamp(&st)
    }

    /// Fold a received remote reading into the local clock and return the
    /// resulting (receive-event) timestamp.
    pub fn update(&self, remote: &Timestamp) -> Timestamp {
        let wall = self.wall.now_nanos();
        let mut st = self.state.lock();

        let prev = st.physical;
        let next = prev.max(remote.physical).max(wall);

        (st.physical, st.logical) = if next == remote.physical {
            // Covers the three-way tie too: max of both counters dominates both.
            bump(next, st.logical.max(remote.logical))
        } else if next == prev {
            bump(next, st.logical)
        } else {
            (next, 0)
        };

        self.stamp(&st)
    }

    /// Latest issued reading without advancing the clock.
    pub fn peek(&self) -> Timestamp {
        let st = self.state.lock();
        self.stamp(&st)
    }

    fn stamp(&self, st: &ClockState) -> Timestamp {
        Timestamp {
            physical: st.physical,
            logical: st.logical,
            node_id: self.node_id.clone(),
        }
    }
}
