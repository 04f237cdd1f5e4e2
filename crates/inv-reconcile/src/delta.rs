//! Wire-delta validation.
//!
//! Merge assumes well-formed, non-negative per-node counters. Everything that
//! arrives from a transport passes through here first.

use std::collections::BTreeMap;

use inv_crdt::{NodeCounts, PnCounter};
use inv_schemas::SyncRequest;

/// Which half of a PN delta set an offending entry was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaMap {
    P,
    N,
}

impl DeltaMap {
    fn as_str(&self) -> &'static str {
        match self {
            DeltaMap::P => "p_deltas",
            DeltaMap::N => "n_deltas",
        }
    }
}

/// A sync request that must not reach merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRejected {
    /// The sending replica did not identify itself.
    EmptyNodeId,
    /// A slot key is empty.
    EmptySlotKey { map: DeltaMap },
    /// A cumulative count is negative (cannot come from a grow-only slot).
    NegativeCount {
        map: DeltaMap,
        node_id: String,
        value: i64,
    },
}

impl std::fmt::Display for SyncRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNodeId => write!(f, "sync rejected: node_id must not be empty"),
            Self::EmptySlotKey { map } => {
                write!(f, "sync rejected: {} contains an empty node key", map.as_str())
            }
            Self::NegativeCount {
                map,
                node_id,
                value,
            } => write!(
                f,
                "sync rejected: {}[{node_id}] = {value} (counts must be >= 0)",
                map.as_str()
            ),
        }
    }
}

impl std::error::Error for SyncRejected {}

/// Validated, merge-ready P/N maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaSet {
    pub p: NodeCounts,
    pub n: NodeCounts,
}

impl DeltaSet {
    /// Validate a full sync request (sender id + both maps).
    pub fn from_request(req: &SyncRequest) -> Result<Self, SyncRejected> {
        if req.node_id.trim().is_empty() {
            return Err(SyncRejected::EmptyNodeId);
        }
        Self::from_wire(&req.p_deltas, &req.n_deltas)
    }

    /// Validate signed wire maps.
    pub fn from_wire(
        p: &BTreeMap<String, i64>,
        n: &BTreeMap<String, i64>,
    ) -> Result<Self, SyncRejected> {
        Ok(Self {
            p: convert(DeltaMap::P, p)?,
            n: convert(DeltaMap::N, n)?,
        })
    }

    /// Full state of a local counter (what a replica resends until confirmed).
    pub fn from_counter(counter: &PnCounter) -> Self {
        Self {
            p: counter.p().clone(),
            n: counter.n().clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.p.is_empty() && self.n.is_empty()
    }
}

fn convert(map: DeltaMap, raw: &BTreeMap<String, i64>) -> Result<NodeCounts, SyncRejected> {
    let mut out = NodeCounts::new();
    for (node_id, &value) in raw {
        if node_id.is_empty() {
            return Err(SyncRejected::EmptySlotKey { map });
        }
        if value < 0 {
            return Err(SyncRejected::NegativeCount {
                map,
                node_id: node_id.clone(),
                value,
            });
        }
        out.insert(node_id.clone(), value as u64);
    }
    Ok(out)
}

/// Unsigned counts back to the signed wire form (saturating at `i64::MAX`).
pub(crate) fn to_wire(counts: &NodeCounts) -> BTreeMap<String, i64> {
    counts
        .iter()
        .map(|(k, &v)| (k.clone(), i64::try_from(v).unwrap_or(i64::MAX)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(items: &[(&str, i64)]) -> BTreeMap<String, i64> {
        items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn negative_count_rejected_with_location() {
        let err = DeltaSet::from_wire(&wire(&[("a", 1)]), &wire(&[("b", -3)])).unwrap_err();
        assert_eq!(
            err,
            SyncRejected::NegativeCount {
                map: DeltaMap::N,
                node_id: "b".to_string(),
                value: -3
            }
        );
        assert!(err.to_string().contains("n_deltas[b] = -3"));
    }

    #[test]
    fn empty_key_rejected() {
        let err = DeltaSet::from_wire(&wire(&[("", 1)]), &wire(&[])).unwrap_err();
        assert_eq!(err, SyncRejected::EmptySlotKey { map: DeltaMap::P });
    }

    #[test]
    fn zero_counts_are_well_formed() {
        let d = DeltaSet::from_wire(&wire(&[("a", 0)]), &wire(&[])).unwrap();
        assert_eq!(d.p["a"], 0);
        assert!(!d.is_empty());
    }

    #[test]
    fn to_wire_saturates() {
        let mut c = NodeCounts::new();
        c.insert("big".to_string(), u64::MAX);
        assert_eq!(to_wire(&c)["big"], i64::MAX);
    }
}
