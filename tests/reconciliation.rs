//! End-to-end checks of the reconciliation read model against a synthetic ledger.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use wager_reconcile::db::SqliteProfileStore;
use wager_reconcile::ledger::InMemoryLedger;
use wager_reconcile::models::amount::signed_to_decimal;
use wager_reconcile::models::{
    Market, MarketId, Period, SettlementStatus, SpendLimits, SpendRecord, WagerEvent,
};
use wager_reconcile::reconcile::UnconfiguredLimitPolicy;
use wager_reconcile::{Reconciler, ReconcilerSettings};

const DECIMALS: u32 = 6;
const UNIT: u64 = 1_000_000;

fn units(whole: u64) -> U256 {
    U256::from(whole * UNIT)
}

fn tenths(n: u64) -> U256 {
    U256::from(n * UNIT / 10)
}

fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

fn market(id: u64, options: &[&str], winner: Option<&str>, prize: U256) -> Market {
    Market {
        market_id: MarketId::new(id),
        options: options.iter().map(|o| o.to_string()).collect(),
        start_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        end_time: Utc.timestamp_opt(1_700_604_800, 0).unwrap(),
        is_completed: winner.is_some(),
        winning_option: winner.map(str::to_string),
        prize_pool: prize,
        fee_rate_basis_points: 500,
    }
}

fn wager(id: u64, bettor: Address, option: &str, amount: U256, ts: i64) -> WagerEvent {
    WagerEvent {
        market_id: MarketId::new(id),
        bettor,
        chosen_option: option.to_string(),
        amount,
        ledger_timestamp: Utc.timestamp_opt(ts, 0).unwrap(),
    }
}

/// Market 1: resolved "Yes", prize 100, winning volume 40, alice bet 10 on Yes.
/// Market 2: resolved "Red", alice bet 2 on Blue.
/// Market 3: four options, no wagers yet.
/// Market 4: resolved "Yes" with nobody on Yes.
fn ledger() -> InMemoryLedger {
    let bob = Address::repeat_byte(0xb0);
    let carol = Address::repeat_byte(0xc0);

    InMemoryLedger::new()
        .with_market(market(1, &["Yes", "No"], Some("Yes"), units(100)))
        .with_wager(wager(1, alice(), "Yes", units(10), 1_700_000_100))
        .with_wager(wager(1, bob, "Yes", units(30), 1_700_000_200))
        .with_wager(wager(1, carol, "No", units(60), 1_700_000_300))
        .with_market(market(2, &["Red", "Blue"], Some("Red"), units(5)))
        .with_wager(wager(2, alice(), "Blue", units(2), 1_700_001_000))
        .with_wager(wager(2, bob, "Red", units(3), 1_700_001_100))
        .with_market(market(3, &["A", "B", "C", "D"], None, U256::ZERO))
        .with_market(market(4, &["Yes", "No"], Some("Yes"), units(50)))
        .with_wager(wager(4, bob, "No", units(50), 1_700_002_000))
}

async fn reconciler(ledger: InMemoryLedger, policy: UnconfiguredLimitPolicy) -> Reconciler {
    let profiles = SqliteProfileStore::in_memory().await.unwrap();
    profiles.link_address("alice", alice()).await.unwrap();

    let settings = ReconcilerSettings {
        unconfigured_limit_policy: policy,
        ..Default::default()
    };
    Reconciler::new(Arc::new(ledger), Arc::new(profiles), settings)
}

#[tokio::test]
async fn win_and_loss_match_the_settlement_formula() {
    let reconciler = reconciler(ledger(), UnconfiguredLimitPolicy::FailOpen).await;

    let history = reconciler
        .get_user_settlement_history("alice", &[MarketId::new(1), MarketId::new(2)])
        .await
        .unwrap();

    assert_eq!(history.len(), 2);

    let win = &history[0];
    assert_eq!(win.status, SettlementStatus::Won);
    assert_eq!(signed_to_decimal(win.profit_loss, DECIMALS), Some(dec!(13.75)));

    let loss = &history[1];
    assert_eq!(loss.status, SettlementStatus::Lost);
    assert_eq!(signed_to_decimal(loss.profit_loss, DECIMALS), Some(dec!(-2.0)));
}

#[tokio::test]
async fn settlement_history_is_deterministic() {
    let reconciler = reconciler(ledger(), UnconfiguredLimitPolicy::FailOpen).await;
    let markets = [MarketId::new(1), MarketId::new(2), MarketId::new(3)];

    let first = reconciler
        .get_user_settlement_history("alice", &markets)
        .await
        .unwrap();
    let second = reconciler
        .get_user_settlement_history("alice", &markets)
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn zero_winning_volume_resolves_as_lost() {
    // Alice is on the winning side but her wager carries no volume
    let inconsistent = InMemoryLedger::new()
        .with_market(market(4, &["Yes", "No"], Some("Yes"), units(50)))
        .with_wager(wager(4, alice(), "Yes", units(0), 1_700_002_100))
        .with_wager(wager(4, Address::repeat_byte(0xb0), "No", units(50), 1_700_002_000));

    let reconciler = reconciler(inconsistent, UnconfiguredLimitPolicy::FailOpen).await;
    let history = reconciler
        .get_user_settlement_history("alice", &[MarketId::new(4)])
        .await
        .unwrap();

    assert_eq!(history[0].status, SettlementStatus::Lost);
    assert!(!history[0].degraded);
}

#[tokio::test]
async fn empty_market_splits_odds_equally() {
    let reconciler = reconciler(ledger(), UnconfiguredLimitPolicy::FailOpen).await;

    let odds = reconciler.get_market_odds(MarketId::new(3)).await.unwrap();

    assert_eq!(odds.options.len(), 4);
    assert!(odds.options.iter().all(|o| o.percentage == dec!(25)));
    assert!(!odds.degraded);
}

#[tokio::test]
async fn odds_sum_to_one_hundred_within_truncation() {
    let reconciler = reconciler(ledger(), UnconfiguredLimitPolicy::FailOpen).await;

    for market_id in [MarketId::new(1), MarketId::new(2), MarketId::new(4)] {
        let odds = reconciler.get_market_odds(market_id).await.unwrap();
        let tolerance = Decimal::new(odds.options.len() as i64, 2);
        let sum = odds.percentage_sum();

        assert!(sum <= dec!(100) && sum >= dec!(100) - tolerance, "{}: {}", market_id, sum);
    }
}

#[tokio::test]
async fn one_failed_option_query_only_degrades_that_option() {
    let ledger = InMemoryLedger::new()
        .with_market(market(7, &["Low", "Mid", "High"], None, U256::ZERO))
        .with_wager(wager(7, alice(), "Low", units(1), 1_700_000_000))
        .with_wager(wager(7, Address::repeat_byte(2), "Mid", units(3), 1_700_000_001))
        .with_wager(wager(7, Address::repeat_byte(3), "High", units(4), 1_700_000_002))
        .fail_volume_for(MarketId::new(7), "Mid");

    let reconciler = reconciler(ledger, UnconfiguredLimitPolicy::FailOpen).await;
    let odds = reconciler.get_market_odds(MarketId::new(7)).await.unwrap();

    assert_eq!(odds.options.len(), 3);
    assert!(odds.degraded);
    assert_eq!(odds.failed_options, vec!["Mid".to_string()]);
    assert_eq!(odds.percentage_of("Low"), Some(dec!(20)));
    assert_eq!(odds.percentage_of("Mid"), Some(dec!(0)));
    assert_eq!(odds.percentage_of("High"), Some(dec!(80)));
}

#[tokio::test]
async fn slow_market_does_not_block_batch_siblings() {
    let ledger = ledger().slow_volume_for(MarketId::new(1), "No", Duration::from_secs(5));

    let profiles = SqliteProfileStore::in_memory().await.unwrap();
    let settings = ReconcilerSettings {
        oracle_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let reconciler = Reconciler::new(Arc::new(ledger), Arc::new(profiles), settings);

    let results = reconciler
        .get_markets_odds(&[MarketId::new(1), MarketId::new(3)])
        .await;

    let slow = results[0].as_ref().unwrap();
    assert!(slow.degraded);
    assert_eq!(slow.percentage_of("Yes"), Some(dec!(100)));

    let sibling = results[1].as_ref().unwrap();
    assert!(!sibling.degraded);
}

#[tokio::test]
async fn quota_boundary_reports_daily_violation() {
    let profiles = SqliteProfileStore::in_memory().await.unwrap();
    profiles
        .set_limits(
            "alice",
            &SpendLimits {
                daily: Some(tenths(50)),
                weekly: Some(units(100)),
                monthly: None,
            },
        )
        .await
        .unwrap();
    profiles
        .record_spend(
            "alice",
            &SpendRecord {
                market_id: MarketId::new(1),
                amount: tenths(45),
                placed_at: Utc::now() - chrono::Duration::hours(1),
            },
        )
        .await
        .unwrap();

    let reconciler = Reconciler::new(
        Arc::new(ledger()),
        Arc::new(profiles),
        ReconcilerSettings::default(),
    );

    let evaluation = reconciler.check_quota("alice", tenths(6)).await.unwrap();
    let daily = evaluation.window(Period::Daily).unwrap();

    assert_eq!(daily.remaining, Some(tenths(5)));
    assert!(evaluation.violates_any);
    assert_eq!(evaluation.first_violation, Some(Period::Daily));
    assert!(!evaluation.window(Period::Weekly).unwrap().is_violated_by(tenths(6)));
}

#[tokio::test]
async fn unconfigured_limits_follow_policy() {
    let open = reconciler(ledger(), UnconfiguredLimitPolicy::FailOpen).await;
    let evaluation = open.check_quota("alice", units(1_000)).await.unwrap();
    assert!(!evaluation.limits_configured);
    assert!(!evaluation.violates_any);

    let closed = reconciler(ledger(), UnconfiguredLimitPolicy::FailClosed).await;
    let evaluation = closed.check_quota("alice", units(1)).await.unwrap();
    assert!(evaluation.violates_any);
    assert_eq!(evaluation.first_violation, Some(Period::Daily));
}
