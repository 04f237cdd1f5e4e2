use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use inv_crdt::{CrdtError, GCounter, NodeCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadProgress {
    pub count: u64,
    /// Milestone crossed by this change, if any.
    pub milestone: Option<u64>,
}

/// Group-buy participant tallies, one G-Counter per squad.
pub struct SquadTracker {
    milestones: Vec<u64>,
    squads: Mutex<BTreeMap<String, GCounter>>,
}

impl SquadTracker {
    /// `milestones` must be strictly increasing (checked by config validation).
    pub fn new(milestones: Vec<u64>) -> Self {
        Self {
            milestones,
            squads: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn milestones(&self) -> &[u64] {
        &self.milestones
    }

    pub fn join(&self, squad_id: &str, node_id: &str) -> Result<SquadProgress, CrdtError> {
        let (before, after) = {
            let mut squads = self.squads.lock();
            let counter = squads.entry(squad_id.to_string()).or_default();
            let before = counter.value();
            counter.inc(node_id, 1)?;
            (before, counter.value())
        };
        Ok(self.progress(squad_id, before, after))
    }

    /// Merge a remote replica's view of one squad.
    pub fn merge(&self, squad_id: &str, remote: &NodeCounts) -> SquadProgress {
        let (before, after) = {
            let mut squads = self.squads.lock();
            let counter = squads.entry(squad_id.to_string()).or_default();
            let before = counter.value();
            counter.merge(remote);
            (before, counter.value())
        };
        self.progress(squad_id, before, after)
    }

    pub fn count(&self, squad_id: &str) -> u64 {
        self.squads
            .lock()
            .get(squad_id)
            .map(GCounter::value)
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, GCounter> {
        self.squads.lock().clone()
    }

    fn progress(&self, squad_id: &str, before: u64, after: u64) -> SquadProgress {
        let milestone = self
            .milestones
            .iter()
            .rev()
            .find(|&&m| before < m && m <= after)
            .copied();
        if let Some(m) = milestone {
            tracing::info!(squad = squad_id, milestone = m, count = after, "squad_milestone_reached");
        }
        SquadProgress {
            count: after,
            milestone,
        }
    }
}
