//! Request and response shapes for the node's external calls.
//!
//! Transport-neutral: the node host serves these in-process, and any REST/RPC
//! layer in front of it encodes them as JSON. No business logic lives here.

use std::collections::BTreeMap;

use inv_clock::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// CRDT delta set from a (possibly long-disconnected) replica.
///
/// Counts are signed on the wire so malformed (negative) entries can be
/// detected and rejected before they reach merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub node_id: String,
    #[serde(default)]
    pub p_deltas: BTreeMap<String, i64>,
    #[serde(default)]
    pub n_deltas: BTreeMap<String, i64>,
    pub remote_ts: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Converged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: SyncStatus,
    pub current_stock: i64,
    pub server_ts: Timestamp,
    pub p_state: BTreeMap<String, u64>,
    pub n_state: BTreeMap<String, u64>,
}

// ---------------------------------------------------------------------------
// Buy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyRequest {
    pub sku: String,
    pub quantity: i64,
    /// Caller-supplied clock-uncertainty bound; overrides configured commit-wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuyStatus {
    Success,
    SoldOut,
    HighContention,
    NotFound,
}

impl BuyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuyStatus::Success => "SUCCESS",
            BuyStatus::SoldOut => "SOLD_OUT",
            BuyStatus::HighContention => "HIGH_CONTENTION",
            BuyStatus::NotFound => "NOT_FOUND",
        }
    }

    /// Whether the caller may usefully resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BuyStatus::HighContention)
    }
}

/// Settlement of one buy. Success fills `tx_id`/`version`/`commit_ts`;
/// failures fill `reason` and never carry a `tx_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyResponse {
    pub status: BuyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_ts: Option<Timestamp>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_wait_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Stock reads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReadRequest {
    pub sku: String,
    /// 0 = strong read of the latest commit.
    #[serde(default)]
    pub staleness_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadMode {
    StrongRead,
    StaleRead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReadResponse {
    pub sku: String,
    pub mode: ReadMode,
    pub stock: i64,
    pub served_version: u64,
    pub commit_ts: Timestamp,
}

// ---------------------------------------------------------------------------
// Squads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadJoinRequest {
    pub squad_id: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquadJoinResponse {
    pub squad_id: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

// ---------------------------------------------------------------------------
// Heartbeat / quorum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    pub ack: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuorumHealth {
    Healthy,
    FailoverActive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumStatusResponse {
    /// Currently effective leader (the standby while failing over).
    pub leader: String,
    pub status: QuorumHealth,
    pub last_heartbeat_ago_seconds: f64,
}
