use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::LedgerOracle;
use crate::error::{ReconcileError, Result};
use crate::models::{Amount, Market, MarketId, WagerEvent};

/// Client for a ledger indexer exposing market state over REST
pub struct HttpLedgerOracle {
    client: Client,
    base_url: String,
}

/// Market as returned by the indexer
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketResponse {
    market_id: String,
    options: Vec<String>,
    start_time: i64,
    end_time: i64,
    is_completed: bool,
    winning_option: Option<String>,
    prize_pool: String,
    fee_rate_basis_points: u32,
}

/// Aggregated volume for one option
#[derive(Debug, Deserialize)]
struct VolumeResponse {
    volume: String,
}

/// Wager placement event
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WagerResponse {
    market_id: String,
    bettor_address: String,
    chosen_option: String,
    amount: String,
    ledger_timestamp: i64,
}

impl HttpLedgerOracle {
    /// Create a new client; every request is bounded by `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReconcileError::OracleUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a JSON document, mapping 404 to `None`
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        debug!("Querying ledger indexer: {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ReconcileError::OracleUnavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Ledger indexer error: {} - {}", status, text);
            return Err(ReconcileError::OracleUnavailable(format!(
                "indexer returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ReconcileError::MalformedLedgerData(format!("undecodable response: {}", e)))
    }

    fn market_url(&self, market_id: MarketId) -> String {
        format!("{}/markets/{}", self.base_url, market_id)
    }
}

#[async_trait]
impl LedgerOracle for HttpLedgerOracle {
    async fn aggregated_volume(&self, market_id: MarketId, option: &str) -> Result<Amount> {
        let url = format!(
            "{}/volume/{}",
            self.market_url(market_id),
            urlencoding::encode(option)
        );

        let response: VolumeResponse = self
            .get_json(&url)
            .await?
            .ok_or(ReconcileError::MarketNotFound(market_id))?;

        parse_amount(&response.volume)
    }

    async fn market(&self, market_id: MarketId) -> Result<Market> {
        let response: MarketResponse = self
            .get_json(&self.market_url(market_id))
            .await?
            .ok_or(ReconcileError::MarketNotFound(market_id))?;

        convert_market(response)
    }

    async fn wager_events(&self, market_id: MarketId) -> Result<Vec<WagerEvent>> {
        let url = format!("{}/wagers", self.market_url(market_id));

        let wagers: Vec<WagerResponse> = self
            .get_json(&url)
            .await?
            .ok_or(ReconcileError::MarketNotFound(market_id))?;

        let events = wagers
            .into_iter()
            .map(convert_wager)
            .collect::<Result<Vec<_>>>()?;

        debug!("Market {} has {} wager events", market_id, events.len());
        Ok(events)
    }

    async fn user_wager(
        &self,
        market_id: MarketId,
        bettor: Address,
    ) -> Result<Option<WagerEvent>> {
        let url = format!("{}/wagers/{}", self.market_url(market_id), bettor);

        match self.get_json::<WagerResponse>(&url).await? {
            Some(wager) => convert_wager(wager).map(Some),
            None => Ok(None),
        }
    }
}

/// Indexer amounts arrive as decimal text in smallest units
fn parse_amount(raw: &str) -> Result<Amount> {
    raw.trim()
        .parse::<U256>()
        .map_err(|e| ReconcileError::MalformedLedgerData(format!("bad amount '{}': {}", raw, e)))
}

fn parse_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ReconcileError::MalformedLedgerData(format!("bad timestamp {}", secs)))
}

fn parse_market_id(raw: &str) -> Result<MarketId> {
    raw.parse()
        .map_err(|e| ReconcileError::MalformedLedgerData(format!("bad market id '{}': {}", raw, e)))
}

/// Convert an indexer market into our model
fn convert_market(market: MarketResponse) -> Result<Market> {
    Ok(Market {
        market_id: parse_market_id(&market.market_id)?,
        options: market.options,
        start_time: parse_timestamp(market.start_time)?,
        end_time: parse_timestamp(market.end_time)?,
        is_completed: market.is_completed,
        winning_option: market.winning_option.filter(|o| !o.is_empty()),
        prize_pool: parse_amount(&market.prize_pool)?,
        fee_rate_basis_points: market.fee_rate_basis_points,
    })
}

/// Convert an indexer wager into our model
fn convert_wager(wager: WagerResponse) -> Result<WagerEvent> {
    let bettor: Address = wager.bettor_address.parse().map_err(|e| {
        ReconcileError::MalformedLedgerData(format!(
            "bad bettor address '{}': {}",
            wager.bettor_address, e
        ))
    })?;

    Ok(WagerEvent {
        market_id: parse_market_id(&wager.market_id)?,
        bettor,
        chosen_option: wager.chosen_option,
        amount: parse_amount(&wager.amount)?,
        ledger_timestamp: parse_timestamp(wager.ledger_timestamp)?,
    })
}
