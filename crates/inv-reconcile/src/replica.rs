use std::sync::Arc;

use inv_clock::{HybridClock, Timestamp};
use inv_crdt::{CrdtError, PnCounter};
use inv_schemas::{SyncRequest, SyncResponse};

use crate::delta::{to_wire, DeltaSet, SyncRejected};

/// Offline node side of reconciliation.
///
/// Sales and restocks land in this node's own slot of a local PN-Counter.
/// Every sync request carries the full accumulated state, so a lost request
/// or a lost response is repaired by simply sending again. Server state is
/// folded in only from a confirmed response.
pub struct ReplicaClient {
    clock: Arc<HybridClock>,
    local: PnCounter,
    /// Own-slot `(p, n)` the server has acknowledged.
    confirmed: (u64, u64),
    last_server_ts: Option<Timestamp>,
}

impl ReplicaClient {
    pub fn new(clock: Arc<HybridClock>) -> Self {
        Self {
            clock,
            local: PnCounter::new(),
            confirmed: (0, 0),
            last_server_ts: None,
        }
    }

    pub fn node_id(&self) -> &str {
        self.clock.node_id()
    }

    pub fn record_sale(&mut self, quantity: u64) -> Result<(), CrdtError> {
        let node = self.clock.node_id().to_string();
        self.local.dec(&node, quantity)?;
        self.clock.now();
        Ok(())
    }

    pub fn record_restock(&mut self, quantity: u64) -> Result<(), CrdtError> {
        let node = self.clock.node_id().to_string();
        self.local.inc(&node, quantity)?;
        self.clock.now();
        Ok(())
    }

    /// Full accumulated P/N plus a fresh HLC reading.
    pub fn sync_request(&self) -> SyncRequest {
        SyncRequest {
            node_id: self.clock.node_id().to_string(),
            p_deltas: to_wire(self.local.p()),
            n_deltas: to_wire(self.local.n()),
            remote_ts: self.clock.now(),
        }
    }

    /// Adopt a confirmed server response. The server's maps are validated the
    /// same way inbound deltas are; a malformed response changes nothing.
    pub fn confirm(&mut self, resp: &SyncResponse) -> Result<(), SyncRejected> {
        let p = to_wire(&resp.p_state);
        let n = to_wire(&resp.n_state);
        let server = DeltaSet::from_wire(&p, &n)?;

        self.clock.update(&resp.server_ts);
        self.local.merge(&server.p, &server.n);

        let own = self.clock.node_id().to_string();
        let acked = (
            server.p.get(&own).copied().unwrap_or(0),
            server.n.get(&own).copied().unwrap_or(0),
        );
        self.confirmed = (self.confirmed.0.max(acked.0), self.confirmed.1.max(acked.1));
        self.last_server_ts = Some(resp.server_ts.clone());
        Ok(())
    }

    /// Own-slot `(p, n)` not yet acknowledged by the server.
    pub fn pending(&self) -> (u64, u64) {
        let (p, n) = self.local.contribution(self.clock.node_id());
        (
            p.saturating_sub(self.confirmed.0),
            n.saturating_sub(self.confirmed.1),
        )
    }

    pub fn is_synced(&self) -> bool {
        self.pending() == (0, 0)
    }

    /// Local view of stock: last confirmed server state plus local activity.
    pub fn estimated_stock(&self) -> i64 {
        self.local.value()
    }

    pub fn counter(&self) -> &PnCounter {
        &self.local
    }

    pub fn last_server_ts(&self) -> Option<&Timestamp> {
        self.last_server_ts.as_ref()
    }
}
