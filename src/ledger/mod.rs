//! Read-only access to the distributed ledger.
//!
//! [`LedgerOracle`] is the only seam through which the reconciliation core sees
//! ledger state. Implementations never write.

pub mod http;
pub mod memory;

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Amount, Market, MarketId, WagerEvent};

pub use http::HttpLedgerOracle;
pub use memory::InMemoryLedger;

/// Read-only queries against the ledger's state and event history
#[async_trait]
pub trait LedgerOracle: Send + Sync {
    /// Total amount wagered on `option` in the market
    async fn aggregated_volume(&self, market_id: MarketId, option: &str) -> Result<Amount>;

    /// Current market metadata, including resolution outcome
    async fn market(&self, market_id: MarketId) -> Result<Market>;

    /// Full wager history of the market, in finalization order
    async fn wager_events(&self, market_id: MarketId) -> Result<Vec<WagerEvent>>;

    /// The bettor's wager in the market, if any
    async fn user_wager(&self, market_id: MarketId, bettor: Address)
        -> Result<Option<WagerEvent>>;
}
