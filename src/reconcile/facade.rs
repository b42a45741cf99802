use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::db::ProfileStore;
use crate::error::{ReconcileError, Result};
use crate::ledger::LedgerOracle;
use crate::models::{Amount, MarketId, OddsSnapshot, QuotaEvaluation, SettlementResult};

use super::odds::OddsAggregator;
use super::quota::{SpendQuotaTracker, UnconfiguredLimitPolicy};
use super::settlement::SettlementReplayer;

/// Tunables for the reconciliation facade
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Bound on a single ledger query (one option's volume)
    pub oracle_timeout: Duration,

    /// Bound on one item of a batch (one market's odds or settlement)
    pub batch_item_timeout: Duration,

    pub unconfigured_limit_policy: UnconfiguredLimitPolicy,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            oracle_timeout: Duration::from_secs(3),
            batch_item_timeout: Duration::from_secs(10),
            unconfigured_limit_policy: UnconfiguredLimitPolicy::FailOpen,
        }
    }
}

/// Read model handed to the presentation layer
pub struct Reconciler {
    oracle: Arc<dyn LedgerOracle>,
    profiles: Arc<dyn ProfileStore>,
    odds: OddsAggregator,
    settlement: SettlementReplayer,
    quota: SpendQuotaTracker,
    batch_item_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        oracle: Arc<dyn LedgerOracle>,
        profiles: Arc<dyn ProfileStore>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            odds: OddsAggregator::new(Arc::clone(&oracle), settings.oracle_timeout),
            settlement: SettlementReplayer::new(Arc::clone(&oracle)),
            quota: SpendQuotaTracker::new(
                Arc::clone(&profiles),
                settings.unconfigured_limit_policy,
            ),
            oracle,
            profiles,
            batch_item_timeout: settings.batch_item_timeout,
        }
    }

    /// Live odds for one market.
    ///
    /// Market metadata is required to know the options, so failing to fetch it
    /// is a hard error; per-option failures only degrade the snapshot.
    pub async fn get_market_odds(&self, market_id: MarketId) -> Result<OddsSnapshot> {
        let market = self.oracle.market(market_id).await?;
        Ok(self.odds.compute_odds(market_id, &market.options).await)
    }

    /// Odds for a list of markets, in input order; each market is bounded
    /// separately so a slow or failing one does not affect the rest
    pub async fn get_markets_odds(&self, market_ids: &[MarketId]) -> Vec<Result<OddsSnapshot>> {
        let items = market_ids
            .iter()
            .map(|market_id| self.market_odds_within_budget(*market_id));

        let results = join_all(items).await;
        debug!(
            "Computed odds for {} markets ({} failed)",
            results.len(),
            results.iter().filter(|r| r.is_err()).count()
        );
        results
    }

    /// One batch item. Metadata must arrive within the item budget; option
    /// queries get whatever is left, and an option that misses it degrades
    /// the snapshot instead of failing the market.
    async fn market_odds_within_budget(&self, market_id: MarketId) -> Result<OddsSnapshot> {
        let started = Instant::now();

        let market = match timeout(self.batch_item_timeout, self.oracle.market(market_id)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Metadata for market {} timed out", market_id);
                return Err(ReconcileError::OracleTimeout(self.batch_item_timeout));
            }
        };

        let remaining = self.batch_item_timeout.saturating_sub(started.elapsed());
        Ok(self
            .odds
            .compute_odds_within(market_id, &market.options, remaining)
            .await)
    }

    /// Realized profit/loss for each market the user wagered in, in input order.
    ///
    /// Markets without a wager by the user are skipped. A market whose replay
    /// times out is returned as a degraded result.
    pub async fn get_user_settlement_history(
        &self,
        user_id: &str,
        market_ids: &[MarketId],
    ) -> Result<Vec<SettlementResult>> {
        let bettor = self
            .profiles
            .bettor_address(user_id)
            .await?
            .ok_or_else(|| ReconcileError::UnknownUser(user_id.to_string()))?;

        let items = market_ids.iter().map(|market_id| async move {
            match timeout(self.batch_item_timeout, self.settlement.settle(*market_id, bettor))
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    warn!("Settlement of market {} for {} timed out", market_id, user_id);
                    Ok(SettlementResult::degraded(
                        *market_id,
                        bettor,
                        ReconcileError::OracleTimeout(self.batch_item_timeout).to_string(),
                    ))
                }
            }
        });

        let mut history = Vec::with_capacity(market_ids.len());
        for result in join_all(items).await {
            match result {
                Ok(settlement) => history.push(settlement),
                Err(ReconcileError::WagerNotFound { market_id, .. }) => {
                    debug!("{} has no wager in market {}, skipping", user_id, market_id);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Settlement history for {}: {} markets ({} degraded)",
            user_id,
            history.len(),
            history.iter().filter(|s| s.degraded).count()
        );

        Ok(history)
    }

    /// Whether wagering `candidate` now would exceed any of the user's limits
    pub async fn check_quota(&self, user_id: &str, candidate: Amount) -> Result<QuotaEvaluation> {
        self.quota.evaluate(user_id, candidate).await
    }
}
