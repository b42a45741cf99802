use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Amount;

/// Ledger-assigned market identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub U256);

impl MarketId {
    pub fn new(id: u64) -> Self {
        Self(U256::from(id))
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MarketId {
    type Err = alloy_primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str(s.trim()).map(Self)
    }
}

/// A wagering market as recorded on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Immutable market identity
    pub market_id: MarketId,

    /// Mutually exclusive options, in display order
    pub options: Vec<String>,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    /// Set by the resolution event
    pub is_completed: bool,

    /// Only present once the market is completed
    pub winning_option: Option<String>,

    /// Final prize pool in the ledger's smallest unit
    pub prize_pool: Amount,

    /// Settlement fee, 500 = 5%
    pub fee_rate_basis_points: u32,
}

/// One immutable wager placement read from the ledger event stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerEvent {
    pub market_id: MarketId,
    pub bettor: Address,
    pub chosen_option: String,
    pub amount: Amount,
    pub ledger_timestamp: DateTime<Utc>,
}

impl WagerEvent {
    /// Whether this event is the given bettor's wager in the given market
    pub fn is_by(&self, market_id: MarketId, bettor: Address) -> bool {
        self.market_id == market_id && self.bettor == bettor
    }
}
