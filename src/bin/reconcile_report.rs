use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wager_reconcile::config::{parse_market_list, Config};
use wager_reconcile::db::SqliteProfileStore;
use wager_reconcile::ledger::HttpLedgerOracle;
use wager_reconcile::models::amount::{from_decimal, signed_to_decimal, to_decimal};
use wager_reconcile::models::{MarketId, OddsSnapshot, QuotaEvaluation, SettlementResult};
use wager_reconcile::Reconciler;

/// Human-facing report; the only place ledger units become decimals
#[derive(Debug, Serialize)]
struct Report {
    user_id: String,
    settlements: Vec<SettlementView>,
    total_profit_loss: Option<Decimal>,
    quota: Option<QuotaView>,
    odds: Vec<OddsView>,
}

#[derive(Debug, Serialize)]
struct SettlementView {
    market_id: MarketId,
    option: Option<String>,
    placed_at: Option<String>,
    status: &'static str,
    bet_amount: Option<Decimal>,
    profit_loss: Option<Decimal>,
    degraded: bool,
    failure: Option<String>,
}

#[derive(Debug, Serialize)]
struct QuotaView {
    candidate_amount: Option<Decimal>,
    violates_any: bool,
    first_violation: Option<&'static str>,
    limits_configured: bool,
    windows: Vec<QuotaWindowView>,
}

#[derive(Debug, Serialize)]
struct QuotaWindowView {
    period: &'static str,
    limit: Option<Decimal>,
    used: Option<Decimal>,
    remaining: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct OddsView {
    market_id: MarketId,
    degraded: bool,
    options: Vec<(String, Decimal)>,
    error: Option<String>,
}

/// Parsed command line
struct Args {
    user_id: String,
    markets: Vec<MarketId>,
    amount: Option<Decimal>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reconcile_report=info,wager_reconcile=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    let args = parse_args(&args)?;
    let config = Config::from_env()?;
    let decimals = config.ledger_decimals;

    info!(
        "Building report for {} over {} markets",
        args.user_id,
        args.markets.len()
    );

    let profile_store = Arc::new(SqliteProfileStore::new(&config.database_url).await?);
    let oracle = HttpLedgerOracle::new(
        &config.ledger_api_url,
        Duration::from_millis(config.oracle_timeout_ms),
    )
    .context("Failed to build ledger oracle client")?;

    let reconciler = Reconciler::new(
        Arc::new(oracle),
        profile_store,
        config.reconciler_settings(),
    );

    let settlements = reconciler
        .get_user_settlement_history(&args.user_id, &args.markets)
        .await
        .context("Failed to build settlement history")?;

    let quota = match args.amount {
        Some(amount) => {
            let candidate = from_decimal(amount, decimals)
                .ok_or_else(|| anyhow!("--amount must be a non-negative number"))?;
            let evaluation = reconciler
                .check_quota(&args.user_id, candidate)
                .await
                .context("Failed to evaluate spend quota")?;
            Some(quota_view(&evaluation, decimals))
        }
        None => None,
    };

    let odds = reconciler
        .get_markets_odds(&args.markets)
        .await
        .into_iter()
        .zip(&args.markets)
        .map(|(result, market_id)| odds_view(*market_id, result))
        .collect();

    let report = Report {
        user_id: args.user_id,
        total_profit_loss: total_profit_loss(&settlements, decimals),
        settlements: settlements
            .iter()
            .map(|s| settlement_view(s, decimals))
            .collect(),
        quota,
        odds,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Parse --user, --markets and --amount arguments
fn parse_args(args: &[String]) -> Result<Args> {
    let user_id = match flag_value(args, &["--user", "-u"]) {
        Some(user) => user,
        None => {
            bail!("usage: reconcile_report --user <id> --markets <id,id,...> [--amount <units>]")
        }
    };

    let markets =
        parse_market_list(&flag_value(args, &["--markets", "-m"]).unwrap_or_default())?;

    let amount = flag_value(args, &["--amount", "-a"])
        .map(|raw| raw.parse::<Decimal>().context("--amount must be a decimal"))
        .transpose()?;

    Ok(Args {
        user_id,
        markets,
        amount,
    })
}

/// Value following the first occurrence of any of `flags`
fn flag_value(args: &[String], flags: &[&str]) -> Option<String> {
    args.iter()
        .position(|a| flags.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Net of all non-degraded settlements; `None` if any could not be converted
fn total_profit_loss(settlements: &[SettlementResult], decimals: u32) -> Option<Decimal> {
    settlements
        .iter()
        .filter(|s| !s.degraded)
        .map(|s| signed_to_decimal(s.profit_loss, decimals))
        .sum()
}

fn settlement_view(settlement: &SettlementResult, decimals: u32) -> SettlementView {
    if settlement.degraded {
        warn!(
            "Market {} could not be settled: {}",
            settlement.market_id,
            settlement.failure.as_deref().unwrap_or("unknown")
        );
    }

    SettlementView {
        market_id: settlement.market_id,
        option: settlement.chosen_option.clone(),
        placed_at: settlement.placed_at.map(|t| t.to_rfc3339()),
        status: settlement.status.as_str(),
        bet_amount: to_decimal(settlement.bet_amount, decimals),
        profit_loss: signed_to_decimal(settlement.profit_loss, decimals),
        degraded: settlement.degraded,
        failure: settlement.failure.clone(),
    }
}

fn quota_view(evaluation: &QuotaEvaluation, decimals: u32) -> QuotaView {
    QuotaView {
        candidate_amount: to_decimal(evaluation.candidate_amount, decimals),
        violates_any: evaluation.violates_any,
        first_violation: evaluation.first_violation.map(|p| p.as_str()),
        limits_configured: evaluation.limits_configured,
        windows: evaluation
            .per_window
            .iter()
            .map(|w| QuotaWindowView {
                period: w.period.as_str(),
                limit: w.limit.and_then(|l| to_decimal(l, decimals)),
                used: to_decimal(w.used, decimals),
                remaining: w.remaining.and_then(|r| to_decimal(r, decimals)),
            })
            .collect(),
    }
}

fn odds_view(market_id: MarketId, result: wager_reconcile::Result<OddsSnapshot>) -> OddsView {
    match result {
        Ok(snapshot) => OddsView {
            market_id,
            degraded: snapshot.degraded,
            options: snapshot
                .options
                .into_iter()
                .map(|o| (o.option, o.percentage))
                .collect(),
            error: None,
        },
        Err(e) => OddsView {
            market_id,
            degraded: true,
            options: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}
