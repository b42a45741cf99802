use std::str::FromStr;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use tracing::{info, warn};

use super::ProfileStore;
use crate::error::ReconcileError;
use crate::models::{Amount, MarketId, SpendLimits, SpendRecord};

/// SQLite store for user profiles, spend limits and recorded spend
pub struct SqliteProfileStore {
    pool: Pool<Sqlite>,
}

impl SqliteProfileStore {
    /// Create a new profile store and initialize the database
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create data directory if needed
        if let Some(path) = database_url.strip_prefix("sqlite:") {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .context("Failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database; a single connection so every query sees it
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;

        info!("Profile store initialized");
        Ok(store)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                bettor_address TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create profiles table")?;

        // Limits are decimal strings of smallest units; NULL means uncapped
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spend_limits (
                user_id TEXT PRIMARY KEY,
                daily_limit TEXT,
                weekly_limit TEXT,
                monthly_limit TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create spend_limits table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spend_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                market_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                placed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create spend_records table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_spend_records_user_time
            ON spend_records (user_id, placed_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Link a user to the ledger address they bet from
    pub async fn link_address(&self, user_id: &str, bettor: Address) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, bettor_address, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                bettor_address = excluded.bettor_address,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(bettor.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to link bettor address")?;

        Ok(())
    }

    /// Set or replace a user's spend limits
    pub async fn set_limits(&self, user_id: &str, limits: &SpendLimits) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO spend_limits (user_id, daily_limit, weekly_limit, monthly_limit, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                daily_limit = excluded.daily_limit,
                weekly_limit = excluded.weekly_limit,
                monthly_limit = excluded.monthly_limit,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(limits.daily.map(|l| l.to_string()))
        .bind(limits.weekly.map(|l| l.to_string()))
        .bind(limits.monthly.map(|l| l.to_string()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to store spend limits")?;

        Ok(())
    }

    /// Record a placed wager; called by the write path, never by reconciliation
    pub async fn record_spend(&self, user_id: &str, record: &SpendRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO spend_records (user_id, market_id, amount, placed_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(record.market_id.to_string())
        .bind(record.amount.to_string())
        .bind(record.placed_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to record spend")?;

        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn configured_limits(&self, user_id: &str) -> crate::error::Result<Option<SpendLimits>> {
        let row = sqlx::query_as::<_, LimitsRow>(
            r#"
            SELECT daily_limit, weekly_limit, monthly_limit
            FROM spend_limits
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.map(SpendLimits::try_from).transpose()
    }

    async fn bettor_address(&self, user_id: &str) -> crate::error::Result<Option<Address>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT bettor_address FROM profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;

        row.map(|(raw,)| {
            raw.parse::<Address>().map_err(|e| {
                ReconcileError::ProfileStore(format!("bad bettor address '{}': {}", raw, e))
            })
        })
        .transpose()
    }

    async fn recorded_spend(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> crate::error::Result<Vec<SpendRecord>> {
        let rows = sqlx::query_as::<_, SpendRow>(
            r#"
            SELECT market_id, amount, placed_at FROM spend_records
            WHERE user_id = ? AND placed_at > ?
            ORDER BY placed_at ASC
            "#,
        )
        .bind(user_id)
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(SpendRecord::try_from).collect()
    }
}

fn store_error(e: sqlx::Error) -> ReconcileError {
    warn!("Profile store query failed: {}", e);
    ReconcileError::ProfileStore(e.to_string())
}

fn parse_stored_amount(raw: &str) -> crate::error::Result<Amount> {
    raw.parse::<U256>()
        .map_err(|e| ReconcileError::ProfileStore(format!("bad stored amount '{}': {}", raw, e)))
}

/// Database row representation
#[derive(sqlx::FromRow)]
struct LimitsRow {
    daily_limit: Option<String>,
    weekly_limit: Option<String>,
    monthly_limit: Option<String>,
}

impl TryFrom<LimitsRow> for SpendLimits {
    type Error = ReconcileError;

    fn try_from(row: LimitsRow) -> crate::error::Result<Self> {
        let parse = |raw: Option<String>| raw.as_deref().map(parse_stored_amount).transpose();

        Ok(SpendLimits {
            daily: parse(row.daily_limit)?,
            weekly: parse(row.weekly_limit)?,
            monthly: parse(row.monthly_limit)?,
        })
    }
}

/// Database row representation
#[derive(sqlx::FromRow)]
struct SpendRow {
    market_id: String,
    amount: String,
    placed_at: i64,
}

impl TryFrom<SpendRow> for SpendRecord {
    type Error = ReconcileError;

    fn try_from(row: SpendRow) -> crate::error::Result<Self> {
        let market_id: MarketId = row.market_id.parse().map_err(|e| {
            ReconcileError::ProfileStore(format!("bad market id '{}': {}", row.market_id, e))
        })?;

        let placed_at = DateTime::from_timestamp_millis(row.placed_at).ok_or_else(|| {
            ReconcileError::ProfileStore(format!("bad timestamp {}", row.placed_at))
        })?;

        Ok(SpendRecord {
            market_id,
            amount: parse_stored_amount(&row.amount)?,
            placed_at,
        })
    }
}
