use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use rust_decimal::Decimal;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::ledger::LedgerOracle;
use crate::models::{Amount, MarketId, OddsSnapshot, OptionOdds};

use super::payout::BASIS_POINTS;

/// Converts per-option wagered volume into a normalized distribution
pub struct OddsAggregator {
    oracle: Arc<dyn LedgerOracle>,
    query_timeout: Duration,
}

impl OddsAggregator {
    /// Create a new aggregator; each per-option query gets `query_timeout`
    pub fn new(oracle: Arc<dyn LedgerOracle>, query_timeout: Duration) -> Self {
        Self {
            oracle,
            query_timeout,
        }
    }

    /// Compute odds for `options`, preserving their order.
    ///
    /// Volume queries run concurrently. An option whose query fails or times out
    /// counts as zero volume and marks the snapshot degraded.
    pub async fn compute_odds(&self, market_id: MarketId, options: &[String]) -> OddsSnapshot {
        self.compute_odds_within(market_id, options, self.query_timeout)
            .await
    }

    /// Same as [`compute_odds`](Self::compute_odds) with each option query
    /// bounded by `budget` when it is tighter than the configured timeout
    pub async fn compute_odds_within(
        &self,
        market_id: MarketId,
        options: &[String],
        budget: Duration,
    ) -> OddsSnapshot {
        let query_timeout = self.query_timeout.min(budget);

        let queries = options.iter().map(|option| async move {
            let volume =
                match timeout(query_timeout, self.oracle.aggregated_volume(market_id, option))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ReconcileError::OracleTimeout(query_timeout)),
                };
            (option, volume)
        });

        let mut volumes = Vec::with_capacity(options.len());
        let mut failed_options = Vec::new();

        for (option, result) in join_all(queries).await {
            match result {
                Ok(volume) => volumes.push(volume),
                Err(e) => {
                    warn!(
                        "Volume query for market {} option '{}' failed, counting as zero: {}",
                        market_id, option, e
                    );
                    failed_options.push(option.clone());
                    volumes.push(Amount::ZERO);
                }
            }
        }

        let total_volume = volumes
            .iter()
            .fold(Amount::ZERO, |acc, v| acc.saturating_add(*v));
        let percentages = distribute(&volumes);

        let entries = options
            .iter()
            .zip(volumes)
            .zip(percentages)
            .map(|((option, volume), percentage)| OptionOdds {
                degraded: failed_options.contains(option),
                option: option.clone(),
                volume,
                percentage,
            })
            .collect();

        debug!(
            "Odds for market {}: total volume {}, {} failed options",
            market_id,
            total_volume,
            failed_options.len()
        );

        OddsSnapshot {
            market_id,
            options: entries,
            total_volume,
            degraded: !failed_options.is_empty(),
            failed_options,
        }
    }
}

/// Percentages for each volume, truncated to two fractional digits.
///
/// Scaled by 10^4 in integer space before dividing, the same way the ledger
/// computes shares. Zero total volume splits evenly.
pub fn distribute(volumes: &[Amount]) -> Vec<Decimal> {
    if volumes.is_empty() {
        return Vec::new();
    }

    let scale = Amount::from(BASIS_POINTS);
    let total = volumes
        .iter()
        .fold(Amount::ZERO, |acc, v| acc.saturating_add(*v));

    if total.is_zero() {
        let equal = BASIS_POINTS / volumes.len() as u64;
        return vec![from_basis_points(equal); volumes.len()];
    }

    volumes
        .iter()
        .map(|volume| {
            // volume * 10^4 only overflows for volumes near 2^242; fall back to
            // dividing the total first, which loses precision but stays bounded
            let bps = match volume.checked_mul(scale) {
                Some(scaled) => scaled / total,
                None => *volume / (total / scale).max(Amount::from(1u64)),
            };
            from_basis_points(u64::try_from(bps.min(scale)).unwrap_or(BASIS_POINTS))
        })
        .collect()
}

fn from_basis_points(bps: u64) -> Decimal {
    Decimal::new(bps as i64, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::models::{Market, WagerEvent};
    use alloy_primitives::{Address, U256};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn amounts(values: &[u64]) -> Vec<Amount> {
        values.iter().map(|v| U256::from(*v)).collect()
    }

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn market(id: u64, names: &[&str]) -> Market {
        Market {
            market_id: MarketId::new(id),
            options: options(names),
            start_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            end_time: Utc.timestamp_opt(1_700_086_400, 0).unwrap(),
            is_completed: false,
            winning_option: None,
            prize_pool: U256::ZERO,
            fee_rate_basis_points: 500,
        }
    }

    fn wager(id: u64, byte: u8, option: &str, amount: u64) -> WagerEvent {
        WagerEvent {
            market_id: MarketId::new(id),
            bettor: Address::repeat_byte(byte),
            chosen_option: option.to_string(),
            amount: U256::from(amount),
            ledger_timestamp: Utc.timestamp_opt(1_700_000_500, 0).unwrap(),
        }
    }

    #[test]
    fn test_equal_split_on_zero_volume() {
        assert_eq!(distribute(&amounts(&[0, 0, 0, 0])), vec![dec!(25.00); 4]);
        assert_eq!(distribute(&amounts(&[0, 0, 0])), vec![dec!(33.33); 3]);
        assert!(distribute(&[]).is_empty());
    }

    #[test]
    fn test_percentages_truncate() {
        // 1/3 = 33.333..., 2/3 = 66.666...
        assert_eq!(distribute(&amounts(&[1, 2])), vec![dec!(33.33), dec!(66.66)]);
        assert_eq!(distribute(&amounts(&[0, 5])), vec![dec!(0), dec!(100)]);
    }

    #[test]
    fn test_sum_stays_within_truncation_tolerance() {
        let cases: [&[u64]; 5] = [
            &[1, 1, 1],
            &[7, 13, 29, 31],
            &[1, 999_999_999],
            &[3, 3, 3, 3, 3, 3, 3],
            &[123_456_789, 987_654_321, 555_555_555],
        ];

        for case in cases {
            let sum: Decimal = distribute(&amounts(case)).into_iter().sum();
            let tolerance = Decimal::new(case.len() as i64, 2);
            assert!(sum <= dec!(100), "{:?} sums to {}", case, sum);
            assert!(sum >= dec!(100) - tolerance, "{:?} sums to {}", case, sum);
        }
    }

    #[test]
    fn test_seven_equal_options_lose_one_unit_each() {
        let percentages = distribute(&amounts(&[3, 3, 3, 3, 3, 3, 3]));
        let sum: Decimal = percentages.iter().copied().sum();

        assert_eq!(percentages, vec![dec!(14.28); 7]);
        assert_eq!(sum, dec!(99.96));
    }

    #[test]
    fn test_huge_volumes_do_not_overflow() {
        let percentages = distribute(&[U256::MAX / U256::from(2u64), U256::MAX / U256::from(2u64)]);
        assert_eq!(percentages, vec![dec!(50.00), dec!(50.00)]);
    }

    #[tokio::test]
    async fn test_compute_odds_preserves_option_order() {
        let ledger = InMemoryLedger::new()
            .with_market(market(1, &["C", "A", "B"]))
            .with_wager(wager(1, 1, "A", 300))
            .with_wager(wager(1, 2, "B", 100))
            .with_wager(wager(1, 3, "A", 600));

        let aggregator = OddsAggregator::new(Arc::new(ledger), Duration::from_secs(1));
        let snapshot = aggregator
            .compute_odds(MarketId::new(1), &options(&["C", "A", "B"]))
            .await;

        let names: Vec<_> = snapshot.options.iter().map(|o| o.option.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert_eq!(snapshot.total_volume, U256::from(1000u64));
        assert_eq!(snapshot.percentage_of("A"), Some(dec!(90)));
        assert_eq!(snapshot.percentage_of("B"), Some(dec!(10)));
        assert_eq!(snapshot.percentage_of("C"), Some(dec!(0)));
        assert!(!snapshot.degraded);
    }

    #[tokio::test]
    async fn test_one_failed_option_degrades_without_aborting() {
        let ledger = InMemoryLedger::new()
            .with_market(market(1, &["X", "Y", "Z"]))
            .with_wager(wager(1, 1, "X", 100))
            .with_wager(wager(1, 2, "Y", 300))
            .with_wager(wager(1, 3, "Z", 600))
            .fail_volume_for(MarketId::new(1), "Z");

        let aggregator = OddsAggregator::new(Arc::new(ledger), Duration::from_secs(1));
        let snapshot = aggregator
            .compute_odds(MarketId::new(1), &options(&["X", "Y", "Z"]))
            .await;

        assert_eq!(snapshot.options.len(), 3);
        assert!(snapshot.degraded);
        assert_eq!(snapshot.failed_options, vec!["Z".to_string()]);

        let z = &snapshot.options[2];
        assert!(z.degraded);
        assert_eq!(z.volume, U256::ZERO);
        assert_eq!(z.percentage, dec!(0));

        assert_eq!(snapshot.percentage_of("X"), Some(dec!(25)));
        assert_eq!(snapshot.percentage_of("Y"), Some(dec!(75)));
    }

    #[tokio::test]
    async fn test_budget_tighter_than_query_timeout_applies() {
        let ledger = InMemoryLedger::new()
            .with_market(market(1, &["X", "Y"]))
            .with_wager(wager(1, 1, "X", 100))
            .slow_volume_for(MarketId::new(1), "Y", Duration::from_secs(5));

        let aggregator = OddsAggregator::new(Arc::new(ledger), Duration::from_secs(10));
        let snapshot = aggregator
            .compute_odds_within(MarketId::new(1), &options(&["X", "Y"]), Duration::from_millis(50))
            .await;

        assert_eq!(snapshot.failed_options, vec!["Y".to_string()]);
        assert_eq!(snapshot.percentage_of("X"), Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_timed_out_option_counts_as_failed() {
        let ledger = InMemoryLedger::new()
            .with_market(market(1, &["X", "Y"]))
            .with_wager(wager(1, 1, "X", 100))
            .slow_volume_for(MarketId::new(1), "Y", Duration::from_secs(5));

        let aggregator = OddsAggregator::new(Arc::new(ledger), Duration::from_millis(50));
        let snapshot = aggregator
            .compute_odds(MarketId::new(1), &options(&["X", "Y"]))
            .await;

        assert!(snapshot.degraded);
        assert_eq!(snapshot.failed_options, vec!["Y".to_string()]);
        assert_eq!(snapshot.percentage_of("X"), Some(dec!(100)));
    }
}
