mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use memotx::{DEFAULT_MANAGER, ManagerConfig, PoolConfig, TransactionConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "memotx")]
#[command(about = "Runs concurrent transactional registrations against an in-memory pool")]
struct Cli {
    /// Number of concurrent register() chains
    #[arg(long, default_value_t = 8)]
    chains: usize,
    #[arg(long, default_value_t = 4)]
    pool_size: usize,
    /// Make every n-th registration fail on its profile insert
    #[arg(long)]
    fail_every: Option<usize>,
    /// JSON manager configuration; overrides --pool-size
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("MEMOTX_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TransactionConfig::from_file(path)?,
        None => TransactionConfig {
            managers: vec![ManagerConfig::new(
                DEFAULT_MANAGER,
                PoolConfig::new("demo").max_connections(cli.pool_size),
            )],
        },
    };

    let index = config
        .managers
        .iter()
        .position(|m| m.name == DEFAULT_MANAGER)
        .context("configuration has no default manager")?;
    let (registry, pools) = config.open().await?;
    let pool = pools[index].clone();

    demo::create_schema(pool.database())?;
    let expected_failures = match cli.fail_every {
        Some(0) => anyhow::bail!("--fail-every must be at least 1"),
        Some(n) => demo::seed_conflicts(pool.database(), cli.chains, n)?,
        None => 0,
    };

    let report = demo::run(registry, pool.clone(), cli.chains).await?;

    println!("committed:   {}", report.committed);
    println!("rolled back: {} (expected {})", report.rolled_back, expected_failures);
    println!("users:       {}", report.users);
    println!("profiles:    {}", report.profiles);
    println!("{}", pool.stats().await);

    if report.rolled_back != expected_failures {
        anyhow::bail!("unexpected rollbacks");
    }
    Ok(())
}
