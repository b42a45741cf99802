use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, MarketId};

/// Rolling spend window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Trailing 24 hours
    Daily,
    /// Trailing 7 days
    Weekly,
    /// Trailing 30 days
    Monthly,
}

impl Period {
    /// All windows in evaluation priority order
    pub const ALL: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

    pub fn duration(&self) -> Duration {
        match self {
            Period::Daily => Duration::hours(24),
            Period::Weekly => Duration::days(7),
            Period::Monthly => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

/// Spend limits configured for a user; `None` means no cap for that window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendLimits {
    pub daily: Option<Amount>,
    pub weekly: Option<Amount>,
    pub monthly: Option<Amount>,
}

impl SpendLimits {
    /// Every window capped at zero
    pub fn blocked() -> Self {
        Self {
            daily: Some(Amount::ZERO),
            weekly: Some(Amount::ZERO),
            monthly: Some(Amount::ZERO),
        }
    }

    pub fn limit_for(&self, period: Period) -> Option<Amount> {
        match period {
            Period::Daily => self.daily,
            Period::Weekly => self.weekly,
            Period::Monthly => self.monthly,
        }
    }
}

/// A placed wager as recorded by the write path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendRecord {
    pub market_id: MarketId,
    pub amount: Amount,
    pub placed_at: DateTime<Utc>,
}

/// Usage of one rolling window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaWindow {
    pub period: Period,

    /// `None` when the window is uncapped
    pub limit: Option<Amount>,

    pub used: Amount,

    /// `max(0, limit - used)`, `None` when uncapped
    pub remaining: Option<Amount>,
}

impl QuotaWindow {
    pub fn new(period: Period, limit: Option<Amount>, used: Amount) -> Self {
        Self {
            period,
            limit,
            used,
            remaining: limit.map(|l| l.saturating_sub(used)),
        }
    }

    /// Whether spending `candidate` more would exceed this window
    pub fn is_violated_by(&self, candidate: Amount) -> bool {
        self.remaining.is_some_and(|r| candidate > r)
    }
}

/// Answer to "would this wager exceed a limit"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEvaluation {
    pub user_id: String,

    pub candidate_amount: Amount,

    /// Daily, weekly and monthly windows, in that order
    pub per_window: Vec<QuotaWindow>,

    pub violates_any: bool,

    /// Highest-priority violated window
    pub first_violation: Option<Period>,

    /// Whether the user had limits configured or the default policy applied
    pub limits_configured: bool,
}

impl QuotaEvaluation {
    pub fn window(&self, period: Period) -> Option<&QuotaWindow> {
        self.per_window.iter().find(|w| w.period == period)
    }
}
