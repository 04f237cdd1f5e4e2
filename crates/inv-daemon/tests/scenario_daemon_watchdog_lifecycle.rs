use std::sync::Arc;
use std::time::Duration;

use inv_daemon::state::{BusMsg, NodeHost};
use inv_quorum::QuorumTransition;
use inv_schemas::QuorumHealth;
use inv_testkit::{fixture_config, fixture_config_with, ManualClock, FIXTURE_START_NANOS};
use tokio::sync::broadcast::error::TryRecvError;

fn drain_quorum(rx: &mut tokio::sync::broadcast::Receiver<BusMsg>) -> Vec<QuorumTransition> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(BusMsg::Quorum { transition, .. }) => out.push(transition),
            Ok(_) => {}
            Err(TryRecvError::Lagged(_)) => {}
            Err(_) => return out,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_watchdog_publishes_failover_and_stops_on_shutdown() {
    let wall = Arc::new(ManualClock::new(FIXTURE_START_NANOS));
    let host = Arc::new(NodeHost::with_clock(fixture_config().unwrap(), wall.clone(), Some(1)).unwrap());
    let mut rx = host.subscribe();

    let handle = host.serve();

    // A few polls while the leader is within threshold.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(drain_quorum(&mut rx).is_empty());

    wall.advance(Duration::from_secs(6));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let transitions = drain_quorum(&mut rx);
    assert_eq!(transitions.len(), 1);
    assert!(matches!(
        transitions[0],
        QuorumTransition::FailoverActivated { .. }
    ));
    assert!(host.quorum.is_failover_active());

    handle.shutdown().await.unwrap();

    // Nothing polls after shutdown.
    drain_quorum(&mut rx);
    host.quorum.register_heartbeat("us-east1");
    wall.advance(Duration::from_secs(6));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(drain_quorum(&mut rx).is_empty());
}

#[test]
fn scenario_host_seeds_services_from_config() {
    let wall = Arc::new(ManualClock::new(FIXTURE_START_NANOS));
    let host = NodeHost::with_clock(fixture_config().unwrap(), wall, None)
        .unwrap()
        .with_config_hash("abc123");

    let status = host.status();
    assert_eq!(status.node_id, "server-virginia");
    assert_eq!(status.current_stock, 100);
    assert_eq!(status.skus, vec!["SKU-EXCLUSIVE-B".to_string()]);
    assert_eq!(status.config_hash.as_deref(), Some("abc123"));
    assert_eq!(status.quorum.status, QuorumHealth::Healthy);
    assert_eq!(host.ledger.stock("SKU-EXCLUSIVE-B"), Some(500));
    assert_eq!(host.clock.node_id(), "server-virginia");
}

#[test]
fn scenario_region_overlay_swaps_roles() {
    let cfg = fixture_config_with(&[r#"
node:
  node_id: "server-kolkata"
quorum:
  leader_region: "asia-south1"
  standby_region: "us-east1"
"#])
    .unwrap();
    let host = NodeHost::new(cfg).unwrap();
    assert_eq!(host.quorum.config().leader_region, "asia-south1");
    assert_eq!(host.reconcile.snapshot().contribution("server-kolkata"), (100, 0));
}

#[test]
fn scenario_unrepresentable_threshold_fails_startup_cleanly() {
    let cfg = fixture_config_with(&["quorum:\n  heartbeat_threshold_seconds: 1.0e20\n"]);
    let err = match cfg {
        Err(e) => e,
        Ok(cfg) => match NodeHost::new(cfg) {
            Err(e) => e,
            Ok(_) => panic!("host started with a threshold beyond Duration range"),
        },
    };
    assert!(format!("{err:#}").contains("heartbeat_threshold_seconds"));
}

#[test]
fn scenario_bus_carries_only_node_events() {
    let hb: BusMsg = serde_json::from_str(r#"{"type":"heartbeat","ts_millis":7}"#).unwrap();
    assert!(matches!(hb, BusMsg::Heartbeat { ts_millis: 7 }));

    let free_text = serde_json::from_str::<BusMsg>(r#"{"type":"log_line","level":"info","msg":"x"}"#);
    assert!(free_text.is_err());
}
