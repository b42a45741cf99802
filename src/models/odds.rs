use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Amount, MarketId};

/// Normalized distribution over a market's options, derived from wagered volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub market_id: MarketId,

    /// One entry per option, in the market's display order
    pub options: Vec<OptionOdds>,

    /// Sum of all option volumes that could be fetched
    pub total_volume: Amount,

    /// At least one option's volume could not be fetched and was counted as zero
    pub degraded: bool,

    /// Options whose volume query failed or timed out
    pub failed_options: Vec<String>,
}

/// Odds for a single option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionOdds {
    pub option: String,

    pub volume: Amount,

    /// Percentage in [0, 100], truncated to two fractional digits
    pub percentage: Decimal,

    /// Volume is zero because the query failed, not because nobody wagered
    pub degraded: bool,
}

impl OddsSnapshot {
    /// Look up an option's percentage by name
    pub fn percentage_of(&self, option: &str) -> Option<Decimal> {
        self.options
            .iter()
            .find(|o| o.option == option)
            .map(|o| o.percentage)
    }

    /// Sum of all percentages
    pub fn percentage_sum(&self) -> Decimal {
        self.options.iter().map(|o| o.percentage).sum()
    }
}
