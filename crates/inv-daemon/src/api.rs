//! In-process request handlers.
//!
//! Each handler takes the shared [`NodeHost`] plus an `inv-schemas` request
//! and returns the matching response type. Transport is out of scope; a
//! server or a test calls these directly.

use inv_ledger::LedgerError;
use inv_reconcile::DeltaSet;
use inv_schemas::{
    BuyRequest, BuyResponse, HeartbeatAck, HeartbeatRequest, QuorumStatusResponse,
    SquadJoinRequest, SquadJoinResponse, StockReadRequest, StockReadResponse, SyncRequest,
    SyncResponse,
};

use crate::state::{duration_from_ms, now_millis, BusMsg, NodeHost};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A request the node refuses before touching any service state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => {
                write!(f, "{}: {msg}", self.code())
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::UnknownSku { .. } => ApiError::NotFound(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Reconcile a replica's accumulated counter state.
pub fn sync(host: &NodeHost, req: SyncRequest) -> Result<SyncResponse, ApiError> {
    let deltas = DeltaSet::from_request(&req).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let converged = host
        .reconcile
        .handle_sync(&req.node_id, &deltas, &req.remote_ts);

    host.publish(BusMsg::Synced {
        from: req.node_id,
        current_stock: converged.current_value,
        server_ts: converged.server_timestamp.clone(),
    });
    Ok(converged.into_response())
}

/// Buy under optimistic concurrency.
pub async fn buy(host: &NodeHost, req: BuyRequest) -> Result<BuyResponse, ApiError> {
    let uncertainty = match req.uncertainty_ms {
        None => None,
        Some(ms) => Some(duration_from_ms(ms).ok_or_else(|| {
            ApiError::BadRequest(format!("uncertainty_ms must be a finite value >= 0, got {ms}"))
        })?),
    };

    let outcome = host
        .ledger
        .execute_order(&req.sku, req.quantity, uncertainty)
        .await?;
    let resp = outcome.into_response();

    host.publish(BusMsg::Order {
        sku: req.sku,
        status: resp.status,
        tx_id: resp.tx_id,
        version: resp.version,
    });
    Ok(resp)
}

pub fn heartbeat(host: &NodeHost, req: HeartbeatRequest) -> HeartbeatAck {
    let decision = host.quorum.register_heartbeat(&req.region);
    if let Some(t) = decision.transition {
        host.publish(BusMsg::Quorum {
            ts_millis: now_millis(),
            transition: t,
        });
    }
    HeartbeatAck { ack: true }
}

pub fn quorum_status(host: &NodeHost) -> QuorumStatusResponse {
    host.check_quorum().to_response()
}

/// Exact-staleness stock read (`staleness_secs = 0` is a strong read).
pub fn stock(host: &NodeHost, req: StockReadRequest) -> Result<StockReadResponse, ApiError> {
    let read = host
        .ledger
        .read_stale(&req.sku, std::time::Duration::from_secs(req.staleness_secs))?;
    Ok(read.into_response())
}

pub fn join_squad(host: &NodeHost, req: SquadJoinRequest) -> Result<SquadJoinResponse, ApiError> {
    let progress = host
        .reconcile
        .squads()
        .join(&req.squad_id, &req.node_id)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(SquadJoinResponse {
        squad_id: req.squad_id,
        count: progress.count,
        milestone: progress.milestone,
    })
}
