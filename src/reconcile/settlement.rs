use std::sync::Arc;

use alloy_primitives::Address;
use tracing::{debug, warn};

use crate::error::{ReconcileError, Result};
use crate::ledger::LedgerOracle;
use crate::models::{MarketId, SettlementResult};

use super::payout;

/// Reconstructs a bettor's realized profit/loss by replaying market history
pub struct SettlementReplayer {
    oracle: Arc<dyn LedgerOracle>,
}

impl SettlementReplayer {
    pub fn new(oracle: Arc<dyn LedgerOracle>) -> Self {
        Self { oracle }
    }

    /// Settle the bettor's wager in the market.
    ///
    /// Oracle failures and unresolvable ledger states come back as a degraded
    /// result with zero profit/loss. The only error is `WagerNotFound`.
    pub async fn settle(&self, market_id: MarketId, bettor: Address) -> Result<SettlementResult> {
        let market = match self.oracle.market(market_id).await {
            Ok(market) => market,
            Err(e) => return Ok(self.abort(market_id, bettor, e)),
        };

        let wager = match self.oracle.user_wager(market_id, bettor).await {
            Ok(Some(wager)) => wager,
            Ok(None) => return Err(ReconcileError::WagerNotFound { market_id, bettor }),
            Err(e) => return Ok(self.abort(market_id, bettor, e)),
        };

        let history = match self.oracle.wager_events(market_id).await {
            Ok(history) => history,
            Err(e) => return Ok(self.abort(market_id, bettor, e)),
        };

        // The ledger, not the user-wager lookup, decides when the wager happened
        let placed_at = match history.iter().find(|e| e.is_by(market_id, bettor)) {
            Some(event) => event.ledger_timestamp,
            None => {
                warn!(
                    "Wager by {} missing from market {} history, using lookup timestamp",
                    bettor, market_id
                );
                wager.ledger_timestamp
            }
        };

        let replay = match payout::replay(&market, &wager, &history) {
            Ok(replay) => replay,
            Err(e) => {
                let inconsistency = ReconcileError::InconsistentLedgerState {
                    market_id,
                    reason: e.to_string(),
                };
                return Ok(self.abort(market_id, bettor, inconsistency));
            }
        };

        debug!(
            "Settled market {} for {}: {} ({})",
            market_id,
            bettor,
            replay.status.as_str(),
            replay.profit_loss
        );

        Ok(SettlementResult {
            market_id,
            bettor,
            bet_amount: wager.amount,
            chosen_option: Some(wager.chosen_option),
            placed_at: Some(placed_at),
            status: replay.status,
            profit_loss: replay.profit_loss,
            degraded: false,
            failure: None,
        })
    }

    fn abort(&self, market_id: MarketId, bettor: Address, error: ReconcileError) -> SettlementResult {
        warn!(
            "Settlement replay for market {} / {} aborted: {}",
            market_id, bettor, error
        );
        SettlementResult::degraded(market_id, bettor, error.to_string())
    }
}
