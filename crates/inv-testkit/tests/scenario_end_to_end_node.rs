//! End-to-end through a full node host.

use std::sync::Arc;
use std::time::Duration;

use inv_clock::HybridClock;
use inv_daemon::api;
use inv_daemon::state::{BusMsg, NodeHost};
use inv_reconcile::ReplicaClient;
use inv_schemas::{
    BuyRequest, BuyStatus, HeartbeatRequest, QuorumHealth, SquadJoinRequest, StockReadRequest,
};
use inv_testkit::*;

fn host() -> (Arc<ManualClock>, NodeHost) {
    let wall = Arc::new(ManualClock::new(FIXTURE_START_NANOS));
    let host = NodeHost::with_clock(fixture_config().unwrap(), wall.clone(), Some(5)).unwrap();
    (wall, host)
}

#[test]
fn scenario_partition_converges_to_92_over_lossy_links() {
    for seed in 0..25u64 {
        let (_, host) = host();
        let mut a = ReplicaClient::new(Arc::new(HybridClock::new("node-a")));
        let mut b = ReplicaClient::new(Arc::new(HybridClock::new("node-b")));
        a.record_sale(5).unwrap();
        b.record_sale(3).unwrap();

        let mut link_a = LossyTransport::new(0.4, seed).unwrap();
        let mut link_b = LossyTransport::new(0.4, seed + 1_000).unwrap();

        // Alternate order by seed.
        if seed % 2 == 0 {
            sync_until_confirmed(&host.reconcile, &mut a, &mut link_a, 200).unwrap();
            sync_until_confirmed(&host.reconcile, &mut b, &mut link_b, 200).unwrap();
        } else {
            sync_until_confirmed(&host.reconcile, &mut b, &mut link_b, 200).unwrap();
            sync_until_confirmed(&host.reconcile, &mut a, &mut link_a, 200).unwrap();
        }
        assert_eq!(host.reconcile.current_value(), 92, "seed {seed}");

        // One more reliable round so both replicas see the other's sale.
        let mut reliable = LossyTransport::reliable();
        sync_until_confirmed(&host.reconcile, &mut a, &mut reliable, 1).unwrap();
        sync_until_confirmed(&host.reconcile, &mut b, &mut reliable, 1).unwrap();
        assert_eq!(a.estimated_stock(), 92, "seed {seed}");
        assert_eq!(b.estimated_stock(), 92, "seed {seed}");
    }
}

#[test]
fn scenario_total_loss_is_reported_not_hung() {
    let (_, host) = host();
    let mut a = ReplicaClient::new(Arc::new(HybridClock::new("node-a")));
    a.record_sale(1).unwrap();
    let mut dead = LossyTransport::new(1.0, 0).unwrap();
    let err = sync_until_confirmed(&host.reconcile, &mut a, &mut dead, 10).unwrap_err();
    assert!(err.to_string().contains("not confirmed after 10 rounds"));
    assert_eq!(host.reconcile.current_value(), 100);
}

#[test]
fn scenario_api_sync_publishes_and_rejects_bad_input() {
    let (_, host) = host();
    let mut rx = host.subscribe();

    let mut a = ReplicaClient::new(Arc::new(HybridClock::new("node-a")));
    a.record_sale(5).unwrap();
    let resp = api::sync(&host, a.sync_request()).unwrap();
    assert_eq!(resp.current_stock, 95);
    match rx.try_recv().unwrap() {
        BusMsg::Synced {
            from,
            current_stock,
            ..
        } => {
            assert_eq!(from, "node-a");
            assert_eq!(current_stock, 95);
        }
        other => panic!("unexpected bus message {other:?}"),
    }

    let mut bad = a.sync_request();
    bad.n_deltas.insert("node-a".to_string(), -1);
    let err = api::sync(&host, bad).unwrap_err();
    assert_eq!(err.code(), "BAD_REQUEST");
    assert_eq!(host.reconcile.current_value(), 95);
}

#[tokio::test(start_paused = true)]
async fn scenario_api_buy_paths() {
    let (_, host) = host();

    let ok = api::buy(
        &host,
        BuyRequest {
            sku: "SKU-EXCLUSIVE-B".to_string(),
            quantity: 2,
            uncertainty_ms: Some(4.0),
        },
    )
    .await
    .unwrap();
    assert_eq!(ok.status, BuyStatus::Success);
    assert!(ok.tx_id.is_some());
    assert_eq!(ok.version, Some(2));
    assert_eq!(ok.commit_wait_ms, Some(8.0));

    let sold_out = api::buy(
        &host,
        BuyRequest {
            sku: "SKU-EXCLUSIVE-B".to_string(),
            quantity: 10_000,
            uncertainty_ms: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(sold_out.status, BuyStatus::SoldOut);
    assert!(sold_out.reason.is_some());

    let missing = api::buy(
        &host,
        BuyRequest {
            sku: "SKU-NOPE".to_string(),
            quantity: 1,
            uncertainty_ms: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(missing.status, BuyStatus::NotFound);

    for (quantity, uncertainty_ms) in [(0, None), (1, Some(-3.0)), (1, Some(f64::NAN))] {
        let err = api::buy(
            &host,
            BuyRequest {
                sku: "SKU-EXCLUSIVE-B".to_string(),
                quantity,
                uncertainty_ms,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    let strong = api::stock(
        &host,
        StockReadRequest {
            sku: "SKU-EXCLUSIVE-B".to_string(),
            staleness_secs: 0,
        },
    )
    .unwrap();
    assert_eq!(strong.stock, 498);
    assert_eq!(strong.served_version, 2);

    let err = api::stock(
        &host,
        StockReadRequest {
            sku: "SKU-NOPE".to_string(),
            staleness_secs: 0,
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn scenario_api_quorum_blackout_and_recovery() {
    let (wall, host) = host();
    let mut rx = host.subscribe();

    assert_eq!(api::quorum_status(&host).status, QuorumHealth::Healthy);

    wall.advance(Duration::from_millis(5_001));
    let s = api::quorum_status(&host);
    assert_eq!(s.status, QuorumHealth::FailoverActive);
    assert_eq!(s.leader, "asia-south1");
    assert!(matches!(rx.try_recv().unwrap(), BusMsg::Quorum { .. }));

    let ack = api::heartbeat(
        &host,
        HeartbeatRequest {
            region: "asia-south1".to_string(),
        },
    );
    assert!(ack.ack);
    assert_eq!(api::quorum_status(&host).status, QuorumHealth::FailoverActive);

    api::heartbeat(
        &host,
        HeartbeatRequest {
            region: "us-east1".to_string(),
        },
    );
    assert!(matches!(rx.try_recv().unwrap(), BusMsg::Quorum { .. }));
    let s = api::quorum_status(&host);
    assert_eq!(s.status, QuorumHealth::Healthy);
    assert_eq!(s.leader, "us-east1");
}

#[test]
fn scenario_api_squad_milestone() {
    let (_, host) = host();
    let mut milestones = Vec::new();
    for i in 0..5 {
        let resp = api::join_squad(
            &host,
            SquadJoinRequest {
                squad_id: "squad-1".to_string(),
                node_id: format!("node-{i}"),
            },
        )
        .unwrap();
        milestones.extend(resp.milestone);
    }
    assert_eq!(milestones, vec![5]);

    let err = api::join_squad(
        &host,
        SquadJoinRequest {
            squad_id: "squad-1".to_string(),
            node_id: String::new(),
        },
    )
    .unwrap_err();
    assert_eq!(err.code(), "BAD_REQUEST");
}
