//! GAVEL — timed multi-round auction settlement engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the ledger, admission, and resolution services together, and
//! runs the scheduler loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use gavel::clock::{Clock, SystemClock};
use gavel::config;
use gavel::engine::{Resolver, Scheduler};
use gavel::ledger::Ledger;
use gavel::store::Store;

const BANNER: &str = r#"
  ____    ___     _______ _
 / ___|  / \ \   / / ____| |
| |  _  / _ \ \ / /|  _| | |
| |_| |/ ___ \ V / | |___| |___
 \____/_/   \_\_/  |_____|_____|

  Timed Multi-Round Auction Settlement Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load_or_default("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        poll_interval_ms = cfg.engine.poll_interval_ms,
        grace_window_secs = cfg.bidding.grace_window_secs,
        snipe_window_secs = cfg.bidding.snipe_window_secs,
        allow_overdraft = cfg.ledger.allow_overdraft,
        "GAVEL starting up"
    );

    // -- Wire the services -------------------------------------------------

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(Store::new());
    let ledger = Ledger::new(&cfg.ledger, clock.clone());

    let resolver = Arc::new(Resolver::new(store.clone(), ledger, clock.clone()));
    let scheduler = Arc::new(Scheduler::new(store, resolver, clock, &cfg.engine));

    // -- Run ---------------------------------------------------------------

    let engine = scheduler.start();

    info!("Engine running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received.");
    engine.abort();
    info!("GAVEL shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gavel=info"));

    let json_logging = std::env::var("GAVEL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
