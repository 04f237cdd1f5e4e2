//! Flash-sale contention.
//!
//! GREEN when:
//! - N > S concurrent buyers produce exactly S successes
//! - stock never goes negative
//! - final version = initial version + successes
//! - bounded retries end in HIGH_CONTENTION with nothing written

use std::sync::Arc;
use std::time::Duration;

use inv_clock::HybridClock;
use inv_ledger::*;
use inv_schemas::BuyStatus;

fn ledger(attempts: u32, commit_wait: CommitWait, backoff: Backoff) -> Arc<Ledger> {
    Arc::new(Ledger::new(
        Arc::new(HybridClock::new("server-virginia")),
        LedgerSettings {
            retry: RetryPolicy::new(attempts, backoff),
            commit_wait,
            snapshot_history: 16,
            seed: Some(42),
        },
    ))
}

async fn stampede(ledger: Arc<Ledger>, buyers: usize) -> Vec<OrderOutcome> {
    let mut handles = Vec::with_capacity(buyers);
    for _ in 0..buyers {
        let l = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            l.execute_order("SKU-EXCLUSIVE-B", 1, None).await.unwrap()
        }));
    }
    let mut out = Vec::with_capacity(buyers);
    for h in handles {
        out.push(h.await.unwrap());
    }
    out
}

#[tokio::test(start_paused = true)]
async fn scenario_more_buyers_than_stock_sells_exactly_the_stock() {
    // Enough attempts that nobody can exhaust: each conflict means someone
    // else committed, and at most `stock` commits exist.
    let l = ledger(
        10,
        CommitWait::Fixed(Duration::from_millis(4)),
        Backoff::Jittered {
            min: Duration::from_millis(1),
            max: Duration::from_millis(5),
        },
    );
    l.register_sku("SKU-EXCLUSIVE-B", 5).unwrap();
    let v0 = l.record("SKU-EXCLUSIVE-B").unwrap().version;

    let outcomes = stampede(Arc::clone(&l), 20).await;

    let successes = outcomes.iter().filter(|o| o.is_success()).count();
    let sold_out = outcomes
        .iter()
        .filter(|o| o.status() == BuyStatus::SoldOut)
        .count();
    assert_eq!(successes, 5);
    assert_eq!(sold_out, 15);

    let rec = l.record("SKU-EXCLUSIVE-B").unwrap();
    assert_eq!(rec.stock, 0);
    assert_eq!(rec.version, v0 + successes as u64);

    let mut versions: Vec<u64> = outcomes
        .iter()
        .filter_map(|o| match o {
            OrderOutcome::Success(c) => Some(c.version),
            _ => None,
        })
        .collect();
    versions.sort_unstable();
    assert_eq!(versions, (v0 + 1..=v0 + 5).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_real_threads_never_oversell() {
    let l = ledger(
        3,
        CommitWait::from_bounds(Duration::from_millis(1), Duration::from_millis(2)),
        Backoff::Jittered {
            min: Duration::from_millis(1),
            max: Duration::from_millis(3),
        },
    );
    l.register_sku("SKU-EXCLUSIVE-B", 10).unwrap();
    let v0 = l.record("SKU-EXCLUSIVE-B").unwrap().version;

    let outcomes = stampede(Arc::clone(&l), 40).await;

    let successes = outcomes.iter().filter(|o| o.is_success()).count() as i64;
    let rec = l.record("SKU-EXCLUSIVE-B").unwrap();
    assert!(successes <= 10);
    assert!(rec.stock >= 0);
    assert_eq!(rec.stock, 10 - successes);
    assert_eq!(rec.version, v0 + successes as u64);
    for o in &outcomes {
        if let OrderOutcome::HighContention { attempts } = o {
            assert_eq!(*attempts, 3);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_sold_out_is_not_retried() {
    let l = ledger(5, CommitWait::Fixed(Duration::from_millis(4)), Backoff::None);
    l.register_sku("SKU-EXCLUSIVE-B", 2).unwrap();

    let out = l.execute_order("SKU-EXCLUSIVE-B", 3, None).await.unwrap();
    assert_eq!(
        out,
        OrderOutcome::SoldOut {
            available: 2,
            attempts: 1
        }
    );
    let resp = out.into_response();
    assert_eq!(resp.status, BuyStatus::SoldOut);
    assert!(resp.tx_id.is_none());
    assert_eq!(l.record("SKU-EXCLUSIVE-B").unwrap().version, 1);
}

#[tokio::test]
async fn scenario_unknown_sku_is_not_found() {
    let l = ledger(3, CommitWait::None, Backoff::None);
    let out = l.execute_order("SKU-MISSING", 1, None).await.unwrap();
    assert_eq!(out, OrderOutcome::NotFound);
    assert_eq!(out.into_response().status, BuyStatus::NotFound);
}

#[tokio::test(start_paused = true)]
async fn scenario_continuous_writer_exhausts_retries() {
    let l = ledger(3, CommitWait::Fixed(Duration::from_millis(10)), Backoff::None);
    l.register_sku("SKU-EXCLUSIVE-B", 100).unwrap();

    // A restocker commits every millisecond, so every buyer validation sees a
    // moved version.
    let writer = {
        let l = Arc::clone(&l);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(1)).await;
                l.restock("SKU-EXCLUSIVE-B", 1).unwrap();
            }
        })
    };

    let out = l.execute_order("SKU-EXCLUSIVE-B", 1, None).await.unwrap();
    writer.abort();

    assert_eq!(out, OrderOutcome::HighContention { attempts: 3 });
    let resp = out.into_response();
    assert!(resp.status.is_retryable());
    assert!(resp.tx_id.is_none());

    let rec = l.record("SKU-EXCLUSIVE-B").unwrap();
    // Only restocks were written.
    assert_eq!(rec.stock, 100 + (rec.version as i64 - 1));
}

#[tokio::test(start_paused = true)]
async fn scenario_uncertainty_bound_doubles_commit_wait() {
    let l = ledger(3, CommitWait::Fixed(Duration::from_millis(1)), Backoff::None);
    l.register_sku("SKU-EXCLUSIVE-B", 10).unwrap();

    let start = tokio::time::Instant::now();
    let out = l
        .execute_order("SKU-EXCLUSIVE-B", 2, Some(Duration::from_millis(5)))
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(10));

    match out {
        OrderOutcome::Success(c) => {
            assert_eq!(c.commit_wait, Duration::from_millis(10));
            assert_eq!(c.attempts, 1);
            assert_eq!(c.stock_after, 8);
            assert_eq!(c.tx_id.get_version_num(), 4);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_dropped_order_leaves_no_partial_write() {
    let l = ledger(3, CommitWait::Fixed(Duration::from_secs(60)), Backoff::None);
    l.register_sku("SKU-EXCLUSIVE-B", 10).unwrap();

    let order = l.execute_order("SKU-EXCLUSIVE-B", 4, None);
    let timed_out = tokio::time::timeout(Duration::from_millis(5), order).await;
    assert!(timed_out.is_err());

    let rec = l.record("SKU-EXCLUSIVE-B").unwrap();
    assert_eq!((rec.stock, rec.version), (10, 1));
}
