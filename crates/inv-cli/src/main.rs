use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

const DEFAULT_CONFIG: &str = "config/base.yaml";

#[derive(Parser)]
#[command(name = "inv")]
#[command(about = "InvMesh inventory core CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> region overlay -> ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Deterministic failure-mode simulations
    Simulate {
        /// Layered config paths, base first. Flags override its values.
        #[arg(long = "config", global = true, default_values_t = vec![DEFAULT_CONFIG.to_string()])]
        config_paths: Vec<String>,

        #[command(subcommand)]
        cmd: SimulateCmd,
    },

    /// Latency benchmarks
    Bench {
        #[command(subcommand)]
        cmd: BenchCmd,
    },
}

#[derive(Subcommand)]
enum SimulateCmd {
    /// Two offline replicas sell, then sync over lossy links until confirmed.
    Partition {
        /// Probability that any single request or response is lost
        #[arg(long, default_value_t = 0.3)]
        drop_rate: f64,

        #[arg(long, default_value_t = 7)]
        seed: u64,

        /// Server opening stock (default: config inventory.initial_stock)
        #[arg(long)]
        initial_stock: Option<u64>,

        #[arg(long, default_value_t = 5)]
        sale_a: u64,

        #[arg(long, default_value_t = 3)]
        sale_b: u64,

        #[arg(long, default_value_t = 1_000)]
        max_rounds: u32,
    },

    /// Leader goes silent; measure failover detection, then recover.
    Blackout {
        /// Failover threshold (default: config quorum.heartbeat_threshold_seconds)
        #[arg(long)]
        threshold_secs: Option<f64>,

        /// Watchdog poll step on the simulated clock
        #[arg(long, default_value_t = 100)]
        step_ms: u64,
    },

    /// Concurrent buyers against one SKU.
    FlashSale {
        #[arg(long, default_value_t = 5)]
        stock: i64,

        #[arg(long, default_value_t = 20)]
        buyers: usize,

        /// Total OCC attempts per order (default: config ledger.max_occ_retries)
        #[arg(long)]
        retries: Option<u32>,

        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Subcommand)]
enum BenchCmd {
    /// Order latency percentiles per commit-wait uncertainty bound.
    CommitWait {
        /// Comma-separated uncertainty bounds in milliseconds
        #[arg(long, value_delimiter = ',', default_values_t = vec![1.0, 5.0, 10.0, 20.0])]
        uncertainty_ms: Vec<f64>,

        #[arg(long, default_value_t = 20)]
        samples: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = inv_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Simulate { config_paths, cmd } => {
            let cfg = commands::load_sim_config(&config_paths)?;
            match cmd {
                SimulateCmd::Partition {
                    drop_rate,
                    seed,
                    initial_stock,
                    sale_a,
                    sale_b,
                    max_rounds,
                } => {
                    let report = commands::simulate::partition(&commands::simulate::PartitionArgs {
                        drop_rate,
                        seed,
                        initial_stock: initial_stock.unwrap_or(cfg.inventory.initial_stock),
                        sale_a,
                        sale_b,
                        max_rounds,
                    })?;
                    commands::print_kv(&report);
                    if !report.passed() {
                        anyhow::bail!("partition simulation diverged");
                    }
                }
                SimulateCmd::Blackout {
                    threshold_secs,
                    step_ms,
                } => {
                    let report = commands::simulate::blackout(&cfg, threshold_secs, step_ms)?;
                    commands::print_kv(&report);
                }
                SimulateCmd::FlashSale {
                    stock,
                    buyers,
                    retries,
                    seed,
                } => {
                    let report =
                        commands::simulate::flash_sale(&cfg, stock, buyers, retries, seed).await?;
                    commands::print_kv(&report);
                    if !report.passed() {
                        anyhow::bail!("flash sale invariant violated");
                    }
                }
            }
        }

        Commands::Bench { cmd } => match cmd {
            BenchCmd::CommitWait {
                uncertainty_ms,
                samples,
            } => {
                for line in commands::bench::commit_wait(&uncertainty_ms, samples).await? {
                    println!("{line}");
                }
            }
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable `key=value`.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
