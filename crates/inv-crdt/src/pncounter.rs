use serde::{Deserialize, Serialize};

use crate::{check_mutation, max_merge, total, CrdtError, NodeCounts};

/// Positive-negative counter.
///
/// `P` holds cumulative increments (stock added), `N` cumulative decrements
/// (units sold), one slot per node. `value() = ΣP − ΣN`.
///
/// Callers must only `inc`/`dec` their own node slot. Counts from other nodes
/// enter exclusively through [`PnCounter::merge`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnCounter {
    #[serde(rename = "p")]
    p: NodeCounts,
    #[serde(rename = "n")]
    n: NodeCounts,
}

impl PnCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from raw maps (e.g. a persisted or received snapshot).
    pub fn from_parts(p: NodeCounts, n: NodeCounts) -> Self {
        Self { p, n }
    }

    /// Add `amount` to `node_id`'s increment slot.
    pub fn inc(&mut self, node_id: &str, amount: u64) -> Result<(), CrdtError> {
        check_mutation(node_id, amount)?;
        let slot = self.p.entry(node_id.to_string()).or_insert(0);
        *slot = slot.saturating_add(amount);
        Ok(())
    }

    /// Add `amount` to `node_id`'s decrement slot.
    pub fn dec(&mut self, node_id: &str, amount: u64) -> Result<(), CrdtError> {
        check_mutation(node_id, amount)?;
        let slot = self.n.entry(node_id.to_string()).or_insert(0);
        *slot = slot.saturating_add(amount);
        Ok(())
    }

    /// Net value, clamped into `i64`.
    pub fn value(&self) -> i64 {
        let net = total(&self.p) as i128 - total(&self.n) as i128;
        net.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Merge remote increment/decrement maps. Returns `true` if local state grew.
    pub fn merge(&mut self, other_p: &NodeCounts, other_n: &NodeCounts) -> bool {
        let grew_p = max_merge(&mut self.p, other_p);
        let grew_n = max_merge(&mut self.n, other_n);
        grew_p || grew_n
    }

    /// Merge another whole counter.
    pub fn merge_counter(&mut self, other: &PnCounter) -> bool {
        self.merge(&other.p, &other.n)
    }

    pub fn p(&self) -> &NodeCounts {
        &self.p
    }

    pub fn n(&self) -> &NodeCounts {
        &self.n
    }

    /// `(increments, decrements)` recorded for one node.
    pub fn contribution(&self, node_id: &str) -> (u64, u64) {
        (
            self.p.get(node_id).copied().unwrap_or(0),
            self.n.get(node_id).copied().unwrap_or(0),
        )
    }
}
