use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use inv_clock::{PhysicalClock, SystemClock};

use crate::{
    evaluate_heartbeat, evaluate_staleness, HeartbeatDecision, QuorumConfig, QuorumState,
    QuorumStatus, QuorumTransition,
};

/// Thread-safe quorum monitor over an injected physical clock.
pub struct QuorumMonitor {
    cfg: QuorumConfig,
    clock: Arc<dyn PhysicalClock>,
    state: Mutex<QuorumState>,
}

impl QuorumMonitor {
    pub fn new(cfg: QuorumConfig) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: QuorumConfig, clock: Arc<dyn PhysicalClock>) -> Self {
        let state = QuorumState::boot(clock.now_nanos());
        Self {
            cfg,
            clock,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &QuorumConfig {
        &self.cfg
    }

    pub fn register_heartbeat(&self, region: &str) -> HeartbeatDecision {
        let now = self.clock.now_nanos();
        let decision = evaluate_heartbeat(&self.cfg, &mut self.state.lock(), region, now);
        if !decision.counted {
            tracing::debug!(region, leader = %self.cfg.leader_region, "quorum_heartbeat_ignored");
        }
        if let Some(t) = &decision.transition {
            log_transition(t);
        }
        decision
    }

    pub fn check_integrity(&self) -> QuorumStatus {
        let now = self.clock.now_nanos();
        let (decision, st) = {
            let mut st = self.state.lock();
            let d = evaluate_staleness(&self.cfg, &mut st, now);
            (d, st.clone())
        };
        if let Some(t) = &decision.transition {
            log_transition(t);
        }

        let leader = if st.failover_active {
            &self.cfg.standby_region
        } else {
            &self.cfg.leader_region
        };
        QuorumStatus {
            leader: leader.clone(),
            standby: self.cfg.standby_region.clone(),
            status: st.health(),
            failover_active: st.failover_active,
            elapsed: decision.elapsed,
            last_heartbeat_nanos: st.last_heartbeat_nanos,
            transition: decision.transition,
        }
    }

    pub fn is_failover_active(&self) -> bool {
        self.state.lock().failover_active
    }

    /// Leader silence as of now, without evaluating a transition.
    pub fn silence(&self) -> Duration {
        let now = self.clock.now_nanos();
        Duration::from_nanos(now.saturating_sub(self.state.lock().last_heartbeat_nanos))
    }
}

fn log_transition(t: &QuorumTransition) {
    match t {
        QuorumTransition::FailoverActivated {
            leader,
            standby,
            silence,
        } => tracing::warn!(
            leader = %leader,
            standby = %standby,
            silence_ms = silence.as_millis() as u64,
            "quorum_failover_activated"
        ),
        QuorumTransition::LeaderRecovered { leader } => {
            tracing::info!(leader = %leader, "quorum_leader_recovered")
        }
    }
}
