//! Node lifecycle: create (`NodeHost::with_clock`), serve, shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::state::{now_millis, BusMsg, NodeHost};

/// Running background tasks of a served node.
pub struct ServeHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServeHandle {
    /// Signal every task to stop and wait for them to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            task.await.context("node task panicked")?;
        }
        tracing::info!("node_host_stopped");
        Ok(())
    }
}

impl NodeHost {
    /// Start the quorum watchdog and the bus heartbeat.
    pub fn serve(self: &Arc<Self>) -> ServeHandle {
        let (tx, rx) = watch::channel(false);
        let tasks = vec![
            spawn_quorum_watchdog(Arc::clone(self), self.config.quorum.poll_interval(), rx.clone()),
            spawn_heartbeat(Arc::clone(self), Duration::from_secs(1), rx),
        ];
        tracing::info!(
            node_id = %self.config.node.node_id,
            poll_ms = self.config.quorum.poll_interval_ms,
            "node_host_serving"
        );
        ServeHandle {
            shutdown: tx,
            tasks,
        }
    }
}

/// Poll `check_integrity` every `interval` until shutdown. Transitions are
/// published by `NodeHost::check_quorum`.
pub fn spawn_quorum_watchdog(
    host: Arc<NodeHost>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    host.check_quorum();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Emit a heartbeat on the bus every `interval` until shutdown.
pub fn spawn_heartbeat(
    host: Arc<NodeHost>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    host.publish(BusMsg::Heartbeat { ts_millis: now_millis() });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
