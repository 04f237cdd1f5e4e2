use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use inv_clock::Timestamp;

/// One committed version of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub commit_ts: Timestamp,
    pub version: u64,
    pub stock: i64,
}

/// Read-only copy of a record's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub sku: String,
    pub stock: i64,
    pub version: u64,
    pub last_commit_ts: Timestamp,
}

/// A SKU's authoritative state. Only mutated under its own lock.
#[derive(Debug)]
pub(crate) struct Record {
    sku: String,
    stock: i64,
    version: u64,
    last_commit_ts: Timestamp,
    /// Oldest first; never empty.
    history: VecDeque<Snapshot>,
    history_cap: usize,
}

impl Record {
    pub(crate) fn new(sku: String, stock: i64, commit_ts: Timestamp, history_cap: usize) -> Self {
        let mut history = VecDeque::new();
        history.push_back(Snapshot {
            commit_ts: commit_ts.clone(),
            version: 1,
            stock,
        });
        Self {
            sku,
            stock,
            version: 1,
            last_commit_ts: commit_ts,
            history,
            history_cap: history_cap.max(1),
        }
    }

    pub(crate) fn stock(&self) -> i64 {
        self.stock
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn last_commit_ts(&self) -> &Timestamp {
        &self.last_commit_ts
    }

    /// Apply `delta` as a new version stamped `commit_ts`. Returns the new version.
    pub(crate) fn commit(&mut self, delta: i64, commit_ts: Timestamp) -> u64 {
        self.stock = self.stock.saturating_add(delta);
        self.version += 1;
        self.last_commit_ts = commit_ts.clone();
        self.history.push_back(Snapshot {
            commit_ts,
            version: self.version,
            stock: self.stock,
        });
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
        self.version
    }

    /// Freshest retained version committed at or before `cutoff_nanos`, else
    /// the oldest retained one.
    pub(crate) fn as_of(&self, cutoff_nanos: u64) -> Snapshot {
        self.history
            .iter()
            .rev()
            .find(|s| s.commit_ts.physical <= cutoff_nanos)
            .or_else(|| self.history.front())
            .cloned()
            .unwrap_or_else(|| self.current())
    }

    pub(crate) fn current(&self) -> Snapshot {
        Snapshot {
            commit_ts: self.last_commit_ts.clone(),
            version: self.version,
            stock: self.stock,
        }
    }

    pub(crate) fn view(&self) -> RecordView {
        RecordView {
            sku: self.sku.clone(),
            stock: self.stock,
            version: self.version,
            last_commit_ts: self.last_commit_ts.clone(),
        }
    }
}
