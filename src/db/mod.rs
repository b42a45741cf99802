pub mod profiles;

use alloy_primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{SpendLimits, SpendRecord};

pub use profiles::SqliteProfileStore;

/// User identity and spend-limit persistence, owned by the write path
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Configured limits, `None` when the user never set any
    async fn configured_limits(&self, user_id: &str) -> Result<Option<SpendLimits>>;

    /// Ledger address the user bets from
    async fn bettor_address(&self, user_id: &str) -> Result<Option<Address>>;

    /// Wagers recorded for the user with `placed_at > since`, oldest first
    async fn recorded_spend(&self, user_id: &str, since: DateTime<Utc>)
        -> Result<Vec<SpendRecord>>;
}
