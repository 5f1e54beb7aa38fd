use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use windowguard::config::AppConfig;
use windowguard::RateLimiter;

/// Drive two rate limited operations through one shared limiter.
#[derive(Debug, Parser)]
#[command(name = "windowguard", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured calls per window
    #[arg(short, long)]
    limit: Option<u64>,

    /// Override the configured window, e.g. 10Min
    #[arg(short, long)]
    window: Option<String>,

    /// Calls to make against each operation
    #[arg(long, default_value_t = 100)]
    calls: u64,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(limit) = cli.limit {
        config.limiter.limit = limit;
    }
    if let Some(window) = cli.window {
        config.limiter.window = window;
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    init_tracing(&config);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        limit = config.limiter.limit,
        window = %config.limiter.window,
        "Configuration loaded"
    );

    let limiter = config.limiter.build()?;
    let limited_square = Arc::new(limiter.wrap("square", square as fn(u64) -> u64));
    let limited_cube = Arc::new(limiter.wrap("cube", cube as fn(u64) -> u64));

    let admitted = Arc::new(AtomicU64::new(0));
    let rejected = Arc::new(AtomicU64::new(0));

    let mut tasks = Vec::new();
    for i in 0..cli.calls {
        for op in [Arc::clone(&limited_square), Arc::clone(&limited_cube)] {
            let admitted = Arc::clone(&admitted);
            let rejected = Arc::clone(&rejected);
            tasks.push(tokio::spawn(async move {
                match op.call(i) {
                    Ok(value) => {
                        admitted.fetch_add(1, Ordering::Relaxed);
                        info!(op = %op.key(), input = i, output = value, "Call admitted");
                    }
                    Err(err) => {
                        rejected.fetch_add(1, Ordering::Relaxed);
                        warn!(op = %op.key(), input = i, error = %err, "Call rejected");
                    }
                }
            }));
        }
    }

    for task in tasks {
        task.await?;
    }

    report(&limiter, &["square", "cube"]);
    info!(
        admitted = admitted.load(Ordering::Relaxed),
        rejected = rejected.load(Ordering::Relaxed),
        "Run complete"
    );
    Ok(())
}

fn square(k: u64) -> u64 {
    k.wrapping_mul(k)
}

fn cube(k: u64) -> u64 {
    k.wrapping_mul(k).wrapping_mul(k)
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn report(limiter: &RateLimiter, keys: &[&str]) {
    for key in keys {
        if let Some(remaining) = limiter.remaining(key) {
            info!(op = %key, remaining = remaining.max(0), "Quota left");
        }
    }
}
