use std::time::Duration;

use alloy_primitives::Address;
use thiserror::Error;

use crate::models::MarketId;

/// Errors surfaced by the reconciliation core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// Transient; the caller may retry later
    #[error("ledger oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("ledger oracle did not answer within {0:?}")]
    OracleTimeout(Duration),

    #[error("market {0} not found on ledger")]
    MarketNotFound(MarketId),

    #[error("no wager by {bettor} in market {market_id}")]
    WagerNotFound { market_id: MarketId, bettor: Address },

    #[error("inconsistent ledger state for market {market_id}: {reason}")]
    InconsistentLedgerState { market_id: MarketId, reason: String },

    /// The indexer answered with data that does not decode
    #[error("malformed ledger data: {0}")]
    MalformedLedgerData(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("profile store error: {0}")]
    ProfileStore(String),
}

impl ReconcileError {
    /// Whether re-invoking the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReconcileError::OracleUnavailable(_)
                | ReconcileError::OracleTimeout(_)
                | ReconcileError::ProfileStore(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
