//! inv-crdt
//!
//! State-based counter CRDTs for replicated inventory.
//!
//! Architectural decisions:
//! - PN-Counter for signed stock deltas, G-Counter for tallies that never drop
//! - One slot per contributing node; a node only ever grows its own slot
//! - Merge is per-key `max`: commutative, associative, idempotent
//! - Merge has no error path; validation of inbound maps happens upstream
//!
//! Pure deterministic logic. No IO, no clock, no locking (owners wrap these in
//! their own mutex).

mod gcounter;
mod pncounter;

pub use gcounter::GCounter;
pub use pncounter::PnCounter;

use std::collections::BTreeMap;

/// Per-node cumulative counts. `BTreeMap` keeps iteration and JSON output sorted.
pub type NodeCounts = BTreeMap<String, u64>;

/// Mutation errors. Merge never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrdtError {
    /// `inc`/`dec` amounts must be at least 1.
    ZeroAmount { node_id: String },
    /// Slots must be keyed by a non-empty node id.
    EmptyNodeId,
}

impl std::fmt::Display for CrdtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroAmount { node_id } => {
                write!(f, "crdt invariant: amount must be >= 1 (node={node_id})")
            }
            Self::EmptyNodeId => write!(f, "crdt invariant: node_id must not be empty"),
        }
    }
}

impl std::error::Error for CrdtError {}

fn check_mutation(node_id: &str, amount: u64) -> Result<(), CrdtError> {
    if node_id.is_empty() {
        return Err(CrdtError::EmptyNodeId);
    }
    if amount == 0 {
        return Err(CrdtError::ZeroAmount {
            node_id: node_id.to_string(),
        });
    }
    Ok(())
}

/// Per-key max of `other` into `local`. Returns `true` if any slot grew.
fn max_merge(local: &mut NodeCounts, other: &NodeCounts) -> bool {
    let mut changed = false;
    for (node, &theirs) in other {
        let slot = local.entry(node.clone()).or_insert(0);
        if theirs > *slot {
            *slot = theirs;
            changed = true;
        }
    }
    changed
}

fn total(counts: &NodeCounts) -> u128 {
    counts.values().map(|&v| v as u128).sum()
}
