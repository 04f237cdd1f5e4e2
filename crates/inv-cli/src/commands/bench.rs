use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use inv_clock::HybridClock;
use inv_ledger::{Backoff, CommitWait, Ledger, LedgerSettings, OrderOutcome, RetryPolicy};

use super::percentile;

const BENCH_SKU: &str = "SKU-BENCH";

/// One line per uncertainty bound: sequential single-unit orders, each paying
/// a commit wait of twice the bound.
pub async fn commit_wait(uncertainty_ms: &[f64], samples: usize) -> Result<Vec<String>> {
    if samples == 0 {
        bail!("samples must be > 0");
    }
    let mut lines = Vec::with_capacity(uncertainty_ms.len());

    for &ms in uncertainty_ms {
        let epsilon = Duration::try_from_secs_f64(ms / 1_000.0)
            .ok()
            .with_context(|| format!("uncertainty must be a non-negative number, got {ms}"))?;

        let ledger = Ledger::new(
            Arc::new(HybridClock::new("bench")),
            LedgerSettings {
                retry: RetryPolicy::new(1, Backoff::None),
                commit_wait: CommitWait::None,
                snapshot_history: 1,
                seed: Some(0),
            },
        );
        let stock = i64::try_from(samples).context("samples out of range")?;
        ledger.register_sku(BENCH_SKU, stock)?;

        let mut latencies = Vec::with_capacity(samples);
        for _ in 0..samples {
            let started = Instant::now();
            let outcome = ledger.execute_order(BENCH_SKU, 1, Some(epsilon)).await?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
            if !matches!(outcome, OrderOutcome::Success(_)) {
                bail!("bench order did not commit: {:?}", outcome.status());
            }
            latencies.push(elapsed_ms);
        }
        latencies.sort_by(f64::total_cmp);

        tracing::debug!(uncertainty_ms = ms, samples, "bench_commit_wait_done");
        lines.push(format!(
            "uncertainty_ms={ms} wait_ms={:.3} samples={samples} p50_ms={:.3} p90_ms={:.3} p99_ms={:.3}",
            CommitWait::for_uncertainty(epsilon).as_secs_f64() * 1_000.0,
            percentile(&latencies, 50.0),
            percentile(&latencies, 90.0),
            percentile(&latencies, 99.0),
        ));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latency_is_at_least_the_wait() {
        let lines = commit_wait(&[2.0], 3).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("uncertainty_ms=2 wait_ms=4.000 samples=3"));

        let p50: f64 = lines[0]
            .split_whitespace()
            .find_map(|kv| kv.strip_prefix("p50_ms="))
            .unwrap()
            .parse()
            .unwrap();
        assert!(p50 >= 4.0, "p50 {p50} below the 4ms wait");
    }

    #[tokio::test]
    async fn rejects_negative_bound_and_zero_samples() {
        assert!(commit_wait(&[-1.0], 3).await.is_err());
        assert!(commit_wait(&[1.0], 0).await.is_err());
    }
}
