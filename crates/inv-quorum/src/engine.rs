use std::time::Duration;

use crate::{HeartbeatDecision, QuorumConfig, QuorumState, QuorumTransition, StalenessDecision};

/// Record a heartbeat from `region` at `now_nanos`.
pub fn evaluate_heartbeat(
    cfg: &QuorumConfig,
    st: &mut QuorumState,
    region: &str,
    now_nanos: u64,
) -> HeartbeatDecision {
    if region != cfg.leader_region {
        return HeartbeatDecision {
            counted: false,
            transition: None,
        };
    }

    // A heartbeat stamped before the last one never rewinds liveness.
    st.last_heartbeat_nanos = st.last_heartbeat_nanos.max(now_nanos);

    let transition = if st.failover_active {
        st.failover_active = false;
        Some(QuorumTransition::LeaderRecovered {
            leader: cfg.leader_region.clone(),
        })
    } else {
        None
    };

    HeartbeatDecision {
        counted: true,
        transition,
    }
}

/// Compare leader silence against the threshold at `now_nanos`.
///
/// Failover is sticky until the next leader heartbeat.
pub fn evaluate_staleness(
    cfg: &QuorumConfig,
    st: &mut QuorumState,
    now_nanos: u64,
) -> StalenessDecision {
    let elapsed = Duration::from_nanos(now_nanos.saturating_sub(st.last_heartbeat_nanos));

    if elapsed > cfg.heartbeat_threshold && !st.failover_active {
        st.failover_active = true;
        return StalenessDecision {
            elapsed,
            transition: Some(QuorumTransition::FailoverActivated {
                leader: cfg.leader_region.clone(),
                standby: cfg.standby_region.clone(),
                silence: elapsed,
            }),
        };
    }

    StalenessDecision {
        elapsed,
        transition: None,
    }
}
