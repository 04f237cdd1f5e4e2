use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// `inv` run from the repo root so the default `config/base.yaml` resolves.
fn inv() -> anyhow::Result<std::process::Command> {
    let mut cmd = std::process::Command::cargo_bin("inv")?;
    cmd.current_dir(repo_root());
    Ok(cmd)
}

fn repo_config(rel: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../config")
        .join(rel)
        .to_string_lossy()
        .to_string()
}

#[test]
fn cli_partition_converges_to_92() -> anyhow::Result<()> {
    inv()?
        .args(["simulate", "partition", "--drop-rate", "0.4", "--seed", "11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("final_stock=92"))
        .stdout(predicate::str::contains("replica_a_view=92"))
        .stdout(predicate::str::contains("replica_b_view=92"))
        .stdout(predicate::str::contains("result=PASS"));
    Ok(())
}

#[test]
fn cli_partition_total_loss_fails() -> anyhow::Result<()> {
    inv()?
        .args([
            "simulate",
            "partition",
            "--drop-rate",
            "1.0",
            "--max-rounds",
            "10",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not confirmed after 10 rounds"));
    Ok(())
}

#[test]
fn cli_blackout_uses_config_roles() -> anyhow::Result<()> {
    // The region overlay makes asia-south1 the leader, so failover lands on us-east1.
    let base = repo_config("base.yaml");
    let region = repo_config("regions/asia-south1.yaml");
    inv()?
        .args([
            "simulate",
            "--config",
            base.as_str(),
            "--config",
            region.as_str(),
            "blackout",
            "--threshold-secs",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("leader=asia-south1"))
        .stdout(predicate::str::contains("failover_detected_after_ms=2100"))
        .stdout(predicate::str::contains("leader_during_failover=us-east1"))
        .stdout(predicate::str::contains("recovered=true"));
    Ok(())
}

#[test]
fn cli_flash_sale_never_oversells() -> anyhow::Result<()> {
    inv()?
        .args([
            "simulate",
            "flash-sale",
            "--stock",
            "3",
            "--buyers",
            "12",
            "--retries",
            "10",
            "--seed",
            "5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("invariant=PASS"))
        .stdout(predicate::str::contains("final_stock=-").not());
    Ok(())
}

#[test]
fn cli_bench_commit_wait_prints_one_line_per_bound() -> anyhow::Result<()> {
    let out = inv()?
        .args(["bench", "commit-wait", "--uncertainty-ms", "1,2", "--samples", "3"])
        .output()?;
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("uncertainty_ms=1 wait_ms=2.000"));
    assert!(lines[1].starts_with("uncertainty_ms=2 wait_ms=4.000"));
    Ok(())
}

#[test]
fn cli_rejects_config_the_node_would_refuse() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let overlay = dir.path().join("bad.yaml");
    std::fs::write(&overlay, "ledger:\n  commit_wait_bounds_ms: [8, 2]\n")?;

    let base = repo_config("base.yaml");
    let bad = overlay.to_string_lossy().to_string();
    inv()?
        .args([
            "simulate",
            "--config",
            base.as_str(),
            "--config",
            bad.as_str(),
            "flash-sale",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("commit_wait_bounds_ms"));
    Ok(())
}

#[test]
fn cli_rejects_nan_drop_rate_and_zero_retries() -> anyhow::Result<()> {
    inv()?
        .args(["simulate", "partition", "--drop-rate", "NaN"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("drop rate"));
    inv()?
        .args(["simulate", "flash-sale", "--retries", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("retries must be >= 1"));
    Ok(())
}
