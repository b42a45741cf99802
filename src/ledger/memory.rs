use std::collections::{HashMap, HashSet};
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;

use super::LedgerOracle;
use crate::error::{ReconcileError, Result};
use crate::models::{Amount, Market, MarketId, WagerEvent};

/// Immutable ledger snapshot held in memory.
///
/// Used to replay synthetic event sequences without a real ledger. Volumes are
/// aggregated from the recorded events, so odds and settlement always agree.
/// Failures and latency can be injected per query.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    markets: HashMap<MarketId, Market>,
    events: HashMap<MarketId, Vec<WagerEvent>>,
    failing_volumes: HashSet<(MarketId, String)>,
    slow_volumes: HashMap<(MarketId, String), Duration>,
    failing_event_streams: HashSet<MarketId>,
    unavailable: bool,
    latency: Option<Duration>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(mut self, market: Market) -> Self {
        self.markets.insert(market.market_id, market);
        self
    }

    /// Append a wager to its market's history
    pub fn with_wager(mut self, event: WagerEvent) -> Self {
        self.events.entry(event.market_id).or_default().push(event);
        self
    }

    /// Make the volume query for one option fail
    pub fn fail_volume_for(mut self, market_id: MarketId, option: &str) -> Self {
        self.failing_volumes.insert((market_id, option.to_string()));
        self
    }

    /// Delay the volume query for one option
    pub fn slow_volume_for(mut self, market_id: MarketId, option: &str, delay: Duration) -> Self {
        self.slow_volumes.insert((market_id, option.to_string()), delay);
        self
    }

    /// Make the event history query for one market fail
    pub fn fail_events_for(mut self, market_id: MarketId) -> Self {
        self.failing_event_streams.insert(market_id);
        self
    }

    /// Delay every query
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every query
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    async fn reach(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable {
            return Err(ReconcileError::OracleUnavailable(
                "in-memory ledger marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn history(&self, market_id: MarketId) -> &[WagerEvent] {
        self.events.get(&market_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[async_trait]
impl LedgerOracle for InMemoryLedger {
    async fn aggregated_volume(&self, market_id: MarketId, option: &str) -> Result<Amount> {
        self.reach().await?;

        let key = (market_id, option.to_string());
        if let Some(delay) = self.slow_volumes.get(&key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_volumes.contains(&key) {
            return Err(ReconcileError::OracleUnavailable(format!(
                "volume query for '{}' failed",
                option
            )));
        }
        if !self.markets.contains_key(&market_id) {
            return Err(ReconcileError::MarketNotFound(market_id));
        }

        Ok(self
            .history(market_id)
            .iter()
            .filter(|e| e.chosen_option == option)
            .fold(Amount::ZERO, |acc, e| acc.saturating_add(e.amount)))
    }

    async fn market(&self, market_id: MarketId) -> Result<Market> {
        self.reach().await?;
        self.markets
            .get(&market_id)
            .cloned()
            .ok_or(ReconcileError::MarketNotFound(market_id))
    }

    async fn wager_events(&self, market_id: MarketId) -> Result<Vec<WagerEvent>> {
        self.reach().await?;
        if self.failing_event_streams.contains(&market_id) {
            return Err(ReconcileError::OracleUnavailable(format!(
                "event stream for market {} failed",
                market_id
            )));
        }
        Ok(self.history(market_id).to_vec())
    }

    async fn user_wager(
        &self,
        market_id: MarketId,
        bettor: Address,
    ) -> Result<Option<WagerEvent>> {
        self.reach().await?;
        Ok(self
            .history(market_id)
            .iter()
            .find(|e| e.is_by(market_id, bettor))
            .cloned())
    }
}
