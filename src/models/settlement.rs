use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, MarketId, SignedAmount};

/// Outcome of a bettor's wager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Won,
    Lost,
    /// Market not resolved yet, or the result could not be computed right now
    InProgress,
}

impl SettlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Won => "won",
            SettlementStatus::Lost => "lost",
            SettlementStatus::InProgress => "in_progress",
        }
    }
}

/// Realized profit/loss of one bettor in one market, recomputed from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub market_id: MarketId,

    pub bettor: Address,

    pub bet_amount: Amount,

    /// Option the bettor wagered on, if known
    pub chosen_option: Option<String>,

    /// Ledger timestamp of the wager, resolved from the market's event history
    pub placed_at: Option<DateTime<Utc>>,

    pub status: SettlementStatus,

    /// Reward minus stake, in smallest units
    pub profit_loss: SignedAmount,

    /// The replay could not complete; `profit_loss` is zero and must not be cached
    pub degraded: bool,

    /// Why the replay was aborted
    pub failure: Option<String>,
}

impl SettlementResult {
    /// Error-flagged result for a replay that could not complete
    pub fn degraded(market_id: MarketId, bettor: Address, failure: impl Into<String>) -> Self {
        Self {
            market_id,
            bettor,
            bet_amount: Amount::ZERO,
            chosen_option: None,
            placed_at: None,
            status: SettlementStatus::InProgress,
            profit_loss: SignedAmount::ZERO,
            degraded: true,
            failure: Some(failure.into()),
        }
    }
}
