//! inv-reconcile
//!
//! CRDT reconciliation between disconnected replicas and the authoritative
//! node.
//!
//! Architectural decisions:
//! - One entry point per sync: advance HLC, merge deltas, return convergence
//! - Sync never fails and never blocks on IO; malformed wire deltas are
//!   rejected before they reach merge ([`DeltaSet::from_request`])
//! - Retransmitting an applied delta set is a no-op (max-merge is idempotent)
//! - Replicas never reset their accumulator; they fold the server's state in
//!   only after a confirmed response ([`ReplicaClient`])
//! - Squad participant tallies are grow-only counters with milestone reporting

mod delta;
mod replica;
mod service;
mod squads;

pub use delta::{DeltaMap, DeltaSet, SyncRejected};
pub use replica::ReplicaClient;
pub use service::{ConvergedState, ReconcileService};
pub use squads::{SquadProgress, SquadTracker};
