use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use inv_clock::{HybridClock, Timestamp};
use inv_crdt::{CrdtError, NodeCounts, PnCounter};
use inv_schemas::{SyncResponse, SyncStatus};

use crate::delta::DeltaSet;
use crate::squads::SquadTracker;

/// Result of one sync round: the authoritative merged view plus the
/// server's HLC reading taken after the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergedState {
    pub status: SyncStatus,
    pub current_value: i64,
    pub server_timestamp: Timestamp,
    pub p_state: NodeCounts,
    pub n_state: NodeCounts,
}

impl ConvergedState {
    pub fn into_response(self) -> SyncResponse {
        SyncResponse {
            status: self.status,
            current_stock: self.current_value,
            server_ts: self.server_timestamp,
            p_state: self.p_state,
            n_state: self.n_state,
        }
    }
}

/// Authoritative side of inventory reconciliation.
///
/// Holds the node's HLC, the shared stock PN-Counter and the squad tallies.
/// Each has its own lock; no lock is held while another is taken.
pub struct ReconcileService {
    clock: Arc<HybridClock>,
    inventory: Mutex<PnCounter>,
    squads: SquadTracker,
}

impl ReconcileService {
    /// Seed the counter with `initial_stock` credited to this node's own slot.
    ///
    /// The clock's node id keys that slot, so it must not be empty.
    pub fn new(
        clock: Arc<HybridClock>,
        initial_stock: u64,
        milestones: Vec<u64>,
    ) -> Result<Self, CrdtError> {
        if clock.node_id().is_empty() {
            return Err(CrdtError::EmptyNodeId);
        }
        let mut inventory = PnCounter::new();
        if initial_stock > 0 {
            inventory.inc(clock.node_id(), initial_stock)?;
        }
        Ok(Self {
            clock,
            inventory: Mutex::new(inventory),
            squads: SquadTracker::new(milestones),
        })
    }

    pub fn clock(&self) -> &Arc<HybridClock> {
        &self.clock
    }

    /// Fold a replica's accumulated state into the shared counter.
    ///
    /// Order matters: the clock observes the remote reading before the merge,
    /// and the returned timestamp is taken after it, so it dominates both.
    pub fn handle_sync(
        &self,
        node_id: &str,
        deltas: &DeltaSet,
        remote_clock: &Timestamp,
    ) -> ConvergedState {
        self.clock.update(remote_clock);

        let (changed, current_value, p_state, n_state) = {
            let mut inv = self.inventory.lock();
            let changed = inv.merge(&deltas.p, &deltas.n);
            (changed, inv.value(), inv.p().clone(), inv.n().clone())
        };

        let server_timestamp = self.clock.now();
        tracing::debug!(
            from = node_id,
            remote = %remote_clock,
            server = %server_timestamp,
            changed,
            current_value,
            "crdt_sync_merged"
        );

        ConvergedState {
            status: SyncStatus::Converged,
            current_value,
            server_timestamp,
            p_state,
            n_state,
        }
    }

    pub fn current_value(&self) -> i64 {
        self.inventory.lock().value()
    }

    /// Copy of the whole counter.
    pub fn snapshot(&self) -> PnCounter {
        self.inventory.lock().clone()
    }

    /// Local sale recorded directly on the authoritative node.
    pub fn record_sale(&self, quantity: u64) -> Result<i64, CrdtError> {
        let mut inv = self.inventory.lock();
        inv.dec(self.clock.node_id(), quantity)?;
        Ok(inv.value())
    }

    pub fn restock(&self, quantity: u64) -> Result<i64, CrdtError> {
        let mut inv = self.inventory.lock();
        inv.inc(self.clock.node_id(), quantity)?;
        Ok(inv.value())
    }

    pub fn squads(&self) -> &SquadTracker {
        &self.squads
    }
}
