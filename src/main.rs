use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wager_reconcile::config::Config;
use wager_reconcile::db::SqliteProfileStore;
use wager_reconcile::ledger::HttpLedgerOracle;
use wager_reconcile::workers::OddsMonitorWorker;
use wager_reconcile::Reconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wager_reconcile=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting wager-reconcile");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded (unconfigured limits: {})",
        config.unconfigured_limit_policy
    );

    // Initialize profile store
    let profile_store = Arc::new(SqliteProfileStore::new(&config.database_url).await?);
    info!("Profile store initialized");

    // Initialize ledger client
    let oracle = HttpLedgerOracle::new(
        &config.ledger_api_url,
        Duration::from_millis(config.oracle_timeout_ms),
    )
    .context("Failed to build ledger oracle client")?;
    info!("Ledger oracle client initialized ({})", config.ledger_api_url);

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(oracle),
        profile_store,
        config.reconciler_settings(),
    ));

    let odds_monitor = OddsMonitorWorker::new(
        Arc::clone(&reconciler),
        config.watched_markets.clone(),
        config.odds_refresh_interval,
    );

    let monitor_handle = tokio::spawn(async move {
        odds_monitor.run().await;
    });

    info!("Odds monitor started");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = monitor_handle => {
            error!("Odds monitor exited unexpectedly: {:?}", result);
        }
    }

    info!("Shutting down wager-reconcile");
    Ok(())
}
