use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::ProfileStore;
use crate::error::Result;
use crate::models::{Amount, Period, QuotaEvaluation, QuotaWindow, SpendLimits, SpendRecord};

/// What to enforce for a user who never configured spend limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnconfiguredLimitPolicy {
    /// No caps; nothing can violate
    #[default]
    FailOpen,
    /// Every window capped at zero until limits are configured
    FailClosed,
}

impl FromStr for UnconfiguredLimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" | "fail_open" => Ok(UnconfiguredLimitPolicy::FailOpen),
            "closed" | "fail_closed" => Ok(UnconfiguredLimitPolicy::FailClosed),
            other => Err(format!("unknown limit policy '{}'", other)),
        }
    }
}

impl fmt::Display for UnconfiguredLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnconfiguredLimitPolicy::FailOpen => write!(f, "fail_open"),
            UnconfiguredLimitPolicy::FailClosed => write!(f, "fail_closed"),
        }
    }
}

/// Evaluates prospective wagers against a user's rolling spend limits
pub struct SpendQuotaTracker {
    profiles: Arc<dyn ProfileStore>,
    unconfigured: UnconfiguredLimitPolicy,
}

impl SpendQuotaTracker {
    pub fn new(profiles: Arc<dyn ProfileStore>, unconfigured: UnconfiguredLimitPolicy) -> Self {
        Self {
            profiles,
            unconfigured,
        }
    }

    /// Would `candidate` breach any of the user's windows right now
    pub async fn evaluate(&self, user_id: &str, candidate: Amount) -> Result<QuotaEvaluation> {
        self.evaluate_at(user_id, candidate, Utc::now()).await
    }

    /// Same as [`evaluate`](Self::evaluate) with windows ending at `now`
    pub async fn evaluate_at(
        &self,
        user_id: &str,
        candidate: Amount,
        now: DateTime<Utc>,
    ) -> Result<QuotaEvaluation> {
        let configured = self.profiles.configured_limits(user_id).await?;
        let limits_configured = configured.is_some();

        let limits = configured.unwrap_or_else(|| {
            info!(
                "No spend limits configured for {}, applying {}",
                user_id, self.unconfigured
            );
            match self.unconfigured {
                UnconfiguredLimitPolicy::FailOpen => SpendLimits::default(),
                UnconfiguredLimitPolicy::FailClosed => SpendLimits::blocked(),
            }
        });

        // One fetch covers every window; Monthly is the widest
        let since = now - Period::Monthly.duration();
        let records = self.profiles.recorded_spend(user_id, since).await?;

        let mut evaluation = evaluate_windows(&limits, &records, candidate, now);
        evaluation.user_id = user_id.to_string();
        evaluation.limits_configured = limits_configured;

        debug!(
            "Quota check for {}: candidate {}, violation {:?}",
            user_id, candidate, evaluation.first_violation
        );

        Ok(evaluation)
    }
}

/// Sum of records with `now - window < placed_at <= now`
pub fn used_in_window(records: &[SpendRecord], period: Period, now: DateTime<Utc>) -> Amount {
    let start = now - period.duration();
    records
        .iter()
        .filter(|r| r.placed_at > start && r.placed_at <= now)
        .fold(Amount::ZERO, |acc, r| acc.saturating_add(r.amount))
}

/// Evaluate every window in priority order and report the first violation
pub fn evaluate_windows(
    limits: &SpendLimits,
    records: &[SpendRecord],
    candidate: Amount,
    now: DateTime<Utc>,
) -> QuotaEvaluation {
    let per_window: Vec<QuotaWindow> = Period::ALL
        .iter()
        .map(|period| {
            QuotaWindow::new(
                *period,
                limits.limit_for(*period),
                used_in_window(records, *period, now),
            )
        })
        .collect();

    let first_violation = per_window
        .iter()
        .find(|w| w.is_violated_by(candidate))
        .map(|w| w.period);

    QuotaEvaluation {
        user_id: String::new(),
        candidate_amount: candidate,
        per_window,
        violates_any: first_violation.is_some(),
        first_violation,
        limits_configured: true,
    }
}
