use std::time::Duration;

use serde::{Deserialize, Serialize};

use inv_schemas::{QuorumHealth, QuorumStatusResponse};

/// Static quorum topology and liveness threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumConfig {
    pub leader_region: String,
    pub standby_region: String,
    /// Silence strictly longer than this triggers failover.
    pub heartbeat_threshold: Duration,
}

/// Mutable monitor state. Times are physical nanoseconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumState {
    pub last_heartbeat_nanos: u64,
    pub failover_active: bool,
}

impl QuorumState {
    /// Fresh state as of `now_nanos`: healthy, heartbeat clock starting now.
    pub fn boot(now_nanos: u64) -> Self {
        Self {
            last_heartbeat_nanos: now_nanos,
            failover_active: false,
        }
    }

    pub fn health(&self) -> QuorumHealth {
        if self.failover_active {
            QuorumHealth::FailoverActive
        } else {
            QuorumHealth::Healthy
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuorumTransition {
    /// Leader silent past the threshold; standby now serves.
    FailoverActivated {
        leader: String,
        standby: String,
        silence: Duration,
    },
    /// Leader heartbeat seen while failing over.
    LeaderRecovered { leader: String },
}

/// Result of one heartbeat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeartbeatDecision {
    /// `true` if the heartbeat came from the configured leader.
    pub counted: bool,
    pub transition: Option<QuorumTransition>,
}

/// Result of one staleness evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StalenessDecision {
    pub elapsed: Duration,
    pub transition: Option<QuorumTransition>,
}

/// Full status report from `check_integrity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumStatus {
    /// Effective leader: the standby while failing over.
    pub leader: String,
    pub standby: String,
    pub status: QuorumHealth,
    pub failover_active: bool,
    pub elapsed: Duration,
    pub last_heartbeat_nanos: u64,
    pub transition: Option<QuorumTransition>,
}

impl QuorumStatus {
    pub fn to_response(&self) -> QuorumStatusResponse {
        QuorumStatusResponse {
            leader: self.leader.clone(),
            status: self.status,
            last_heartbeat_ago_seconds: self.elapsed.as_secs_f64(),
        }
    }
}
