use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{error, info, warn};

use crate::models::{MarketId, OddsSnapshot};
use crate::reconcile::Reconciler;

/// Worker that periodically recomputes odds for a watch list of markets.
///
/// Every cycle replays from the ledger; nothing is carried between cycles.
pub struct OddsMonitorWorker {
    reconciler: Arc<Reconciler>,
    markets: Vec<MarketId>,
    refresh_interval: Duration,
}

/// Outcome of a single refresh cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub degraded: usize,
    pub failed: usize,
    /// Failures that may clear up on a later cycle
    pub retryable: usize,
}

impl OddsMonitorWorker {
    /// Create a new odds monitor worker
    pub fn new(
        reconciler: Arc<Reconciler>,
        markets: Vec<MarketId>,
        refresh_interval_secs: u64,
    ) -> Self {
        Self {
            reconciler,
            markets,
            refresh_interval: Duration::from_secs(refresh_interval_secs),
        }
    }

    /// Run the worker loop
    pub async fn run(&self) {
        info!(
            "Odds monitor started for {} markets (interval: {:?})",
            self.markets.len(),
            self.refresh_interval
        );

        let mut interval = time::interval(self.refresh_interval);

        loop {
            interval.tick().await;
            self.refresh().await;
        }
    }

    /// Perform a single refresh cycle
    pub async fn refresh(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        if self.markets.is_empty() {
            warn!("No watched markets configured, nothing to refresh");
            return summary;
        }

        let results = self.reconciler.get_markets_odds(&self.markets).await;

        for (market_id, result) in self.markets.iter().zip(results) {
            match result {
                Ok(snapshot) => {
                    summary.refreshed += 1;
                    if snapshot.degraded {
                        summary.degraded += 1;
                        warn!(
                            "Market {} odds degraded, missing volume for: {}",
                            market_id,
                            snapshot.failed_options.join(", ")
                        );
                    }
                    info!("Odds | Market {} | {}", market_id, describe(&snapshot));
                }
                Err(e) if e.is_retryable() => {
                    summary.failed += 1;
                    summary.retryable += 1;
                    warn!(
                        "Odds for market {} unavailable, retrying next cycle: {}",
                        market_id, e
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Failed to compute odds for market {}: {}", market_id, e);
                }
            }
        }

        info!(
            "Odds refresh complete: {} refreshed, {} degraded, {} failed ({} retryable)",
            summary.refreshed, summary.degraded, summary.failed, summary.retryable
        );
        summary
    }
}

/// One-line rendering such as `Yes 62.5% / No 37.5%`
fn describe(snapshot: &OddsSnapshot) -> String {
    snapshot
        .options
        .iter()
        .map(|o| format!("{} {}%", o.option, o.percentage.normalize()))
        .collect::<Vec<_>>()
        .join(" / ")
}
