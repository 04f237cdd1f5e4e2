use std::sync::Arc;
use std::time::Duration;

use inv_clock::{HybridClock, ManualClock, NANOS_PER_SEC};
use inv_ledger::*;
use inv_schemas::ReadMode;

fn setup() -> (Arc<ManualClock>, Ledger) {
    let wall = Arc::new(ManualClock::new(100 * NANOS_PER_SEC));
    let ledger = Ledger::new(
        Arc::new(HybridClock::with_physical("server-virginia", wall.clone())),
        LedgerSettings {
            retry: RetryPolicy::new(3, Backoff::None),
            commit_wait: CommitWait::None,
            snapshot_history: 3,
            seed: Some(9),
        },
    );
    (wall, ledger)
}

#[tokio::test]
async fn scenario_staleness_selects_freshest_version_before_cutoff() {
    let (wall, l) = setup();
    l.register_sku("SKU-A", 10).unwrap(); // v1 @ 100s

    wall.advance(Duration::from_secs(10));
    assert!(l.execute_order("SKU-A", 1, None).await.unwrap().is_success()); // v2 @ 110s

    wall.advance(Duration::from_secs(10));
    assert!(l.execute_order("SKU-A", 1, None).await.unwrap().is_success()); // v3 @ 120s

    let strong = l.read_stale("SKU-A", Duration::ZERO).unwrap();
    assert_eq!(strong.mode, ReadMode::StrongRead);
    assert_eq!((strong.version, strong.stock), (3, 8));

    let five = l.read_stale("SKU-A", Duration::from_secs(5)).unwrap();
    assert_eq!(five.mode, ReadMode::StaleRead);
    assert_eq!((five.version, five.stock), (2, 9));

    let fifteen = l.read_stale("SKU-A", Duration::from_secs(15)).unwrap();
    assert_eq!((fifteen.version, fifteen.stock), (1, 10));

    let resp = fifteen.into_response();
    assert_eq!(resp.served_version, 1);
    assert_eq!(resp.commit_ts.physical, 100 * NANOS_PER_SEC);
}

#[tokio::test]
async fn scenario_staleness_beyond_history_falls_back_to_oldest_retained() {
    let (wall, l) = setup();
    l.register_sku("SKU-A", 10).unwrap();
    for _ in 0..4 {
        wall.advance(Duration::from_secs(1));
        l.restock("SKU-A", 1).unwrap();
    }
    // history cap 3: versions 3, 4, 5 retained
    let read = l.read_stale("SKU-A", Duration::from_secs(3600)).unwrap();
    assert_eq!(read.version, 3);
    assert_eq!(read.stock, 12);
}

#[test]
fn scenario_registry_rules() {
    let (_, l) = setup();
    l.register_sku("SKU-A", 0).unwrap();
    assert_eq!(
        l.register_sku("SKU-A", 5),
        Err(LedgerError::SkuExists {
            sku: "SKU-A".to_string()
        })
    );
    assert_eq!(l.register_sku(" ", 5), Err(LedgerError::EmptySku));
    assert!(matches!(
        l.register_sku("SKU-B", -1),
        Err(LedgerError::NegativeStock { .. })
    ));
    assert_eq!(
        l.restock("SKU-Z", 1).unwrap_err().to_string(),
        "ledger: sku SKU-Z not found"
    );
    assert!(l.read_stale("SKU-Z", Duration::ZERO).is_err());
    assert_eq!(l.stock("SKU-Z"), None);

    let view = l.restock("SKU-A", 7).unwrap();
    assert_eq!((view.stock, view.version), (7, 2));
    assert_eq!(l.stock("SKU-A"), Some(7));
    assert_eq!(l.skus(), vec!["SKU-A".to_string()]);
}
