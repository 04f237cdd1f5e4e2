use serde::{Deserialize, Serialize};

use crate::{check_mutation, max_merge, total, CrdtError, NodeCounts};

/// Grow-only counter (participant tallies and other counts that never drop).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GCounter {
    counts: NodeCounts,
}

impl GCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: NodeCounts) -> Self {
        Self { counts }
    }

    pub fn inc(&mut self, node_id: &str, amount: u64) -> Result<(), CrdtError> {
        check_mutation(node_id, amount)?;
        let slot = self.counts.entry(node_id.to_string()).or_insert(0);
        *slot = slot.saturating_add(amount);
        Ok(())
    }

    /// Sum of all slots, saturating at `u64::MAX`.
    pub fn value(&self) -> u64 {
        total(&self.counts).min(u64::MAX as u128) as u64
    }

    pub fn merge(&mut self, other: &NodeCounts) -> bool {
        max_merge(&mut self.counts, other)
    }

    pub fn merge_counter(&mut self, other: &GCounter) -> bool {
        self.merge(&other.counts)
    }

    pub fn get(&self, node_id: &str) -> u64 {
        self.counts.get(node_id).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &NodeCounts {
        &self.counts
    }
}
