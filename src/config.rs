use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::models::MarketId;
use crate::reconcile::{ReconcilerSettings, UnconfiguredLimitPolicy};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Ledger indexer REST API URL
    pub ledger_api_url: String,

    /// SQLite database path for the profile store
    pub database_url: String,

    /// Timeout in milliseconds for a single ledger query
    pub oracle_timeout_ms: u64,

    /// Timeout in milliseconds for one market in a batch
    pub batch_item_timeout_ms: u64,

    /// Interval in seconds between odds refreshes
    pub odds_refresh_interval: u64,

    /// Markets whose odds the monitor keeps refreshing
    pub watched_markets: Vec<MarketId>,

    /// Policy for users without configured spend limits
    pub unconfigured_limit_policy: UnconfiguredLimitPolicy,

    /// Fractional digits of the ledger currency, used only for display
    pub ledger_decimals: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            ledger_api_url: env::var("LEDGER_API_URL")
                .unwrap_or_else(|_| "http://localhost:8545/indexer".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/profiles.db".to_string()),

            oracle_timeout_ms: env::var("ORACLE_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("ORACLE_TIMEOUT_MS must be a valid number")?,

            batch_item_timeout_ms: env::var("BATCH_ITEM_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("BATCH_ITEM_TIMEOUT_MS must be a valid number")?,

            odds_refresh_interval: parse_refresh_interval(
                &env::var("ODDS_REFRESH_INTERVAL").unwrap_or_else(|_| "30".to_string()),
            )
            .context("ODDS_REFRESH_INTERVAL must be a positive number of seconds")?,

            watched_markets: parse_market_list(&env::var("WATCHED_MARKETS").unwrap_or_default())
                .context("WATCHED_MARKETS must be a comma-separated list of market ids")?,

            unconfigured_limit_policy: env::var("UNCONFIGURED_LIMIT_POLICY")
                .unwrap_or_else(|_| "open".to_string())
                .parse()
                .map_err(|e: String| anyhow!(e))
                .context("UNCONFIGURED_LIMIT_POLICY must be 'open' or 'closed'")?,

            ledger_decimals: env::var("LEDGER_DECIMALS")
                .unwrap_or_else(|_| "6".to_string())
                .parse()
                .context("LEDGER_DECIMALS must be a valid number")?,
        })
    }

    /// Settings for the reconciliation facade
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            oracle_timeout: Duration::from_millis(self.oracle_timeout_ms),
            batch_item_timeout: Duration::from_millis(self.batch_item_timeout_ms),
            unconfigured_limit_policy: self.unconfigured_limit_policy,
        }
    }
}

/// Refresh interval in seconds, at least one
fn parse_refresh_interval(raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>()? {
        0 => Err(anyhow!("interval must be at least 1 second")),
        secs => Ok(secs),
    }
}

/// Parse a comma-separated list of market ids, ignoring blanks
pub fn parse_market_list(raw: &str) -> Result<Vec<MarketId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<MarketId>()
                .map_err(|e| anyhow!("invalid market id '{}': {}", s, e))
        })
        .collect()
}
