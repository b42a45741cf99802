//! Pure replay of the settlement authority's payout formula.
//!
//! Everything here is integer arithmetic over ledger units, in the same order of
//! operations the authority uses: fee first, then pro-rata division.

use thiserror::Error;
use tracing::warn;

use crate::models::{Amount, Market, SettlementStatus, SignedAmount, WagerEvent};

/// Denominator of `fee_rate_basis_points`
pub const BASIS_POINTS: u64 = 10_000;

/// Inconsistencies that cannot be resolved without guessing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayoutError {
    #[error("market is completed but has no winning option")]
    MissingWinningOption,

    #[error("fee rate {0} bps exceeds 100%")]
    FeeOutOfRange(u32),

    #[error("payout arithmetic overflowed 256 bits")]
    Overflow,
}

/// Result of replaying one wager against a market's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub status: SettlementStatus,
    pub profit_loss: SignedAmount,
}

/// Sum of every wager in the market's history placed on `winning_option`
pub fn total_winning_volume(
    market: &Market,
    history: &[WagerEvent],
    winning_option: &str,
) -> Result<Amount, PayoutError> {
    history
        .iter()
        .filter(|e| e.market_id == market.market_id && e.chosen_option == winning_option)
        .try_fold(Amount::ZERO, |acc, e| {
            acc.checked_add(e.amount).ok_or(PayoutError::Overflow)
        })
}

/// `prize_pool - prize_pool * fee / 10000`
pub fn net_pool(prize_pool: Amount, fee_rate_basis_points: u32) -> Result<Amount, PayoutError> {
    if u64::from(fee_rate_basis_points) > BASIS_POINTS {
        return Err(PayoutError::FeeOutOfRange(fee_rate_basis_points));
    }

    let fee = prize_pool
        .checked_mul(Amount::from(fee_rate_basis_points))
        .ok_or(PayoutError::Overflow)?
        / Amount::from(BASIS_POINTS);

    // fee <= prize_pool because the rate is at most 100%
    Ok(prize_pool - fee)
}

/// `bet * net_pool / total_winning_volume`; the caller guarantees a nonzero divisor
pub fn reward(
    bet: Amount,
    net_pool: Amount,
    total_winning_volume: Amount,
) -> Result<Amount, PayoutError> {
    debug_assert!(!total_winning_volume.is_zero());
    Ok(bet.checked_mul(net_pool).ok_or(PayoutError::Overflow)? / total_winning_volume)
}

fn signed(amount: Amount) -> Result<SignedAmount, PayoutError> {
    SignedAmount::try_from(amount).map_err(|_| PayoutError::Overflow)
}

fn lost(bet: Amount) -> Result<Replay, PayoutError> {
    Ok(Replay {
        status: SettlementStatus::Lost,
        profit_loss: -signed(bet)?,
    })
}

/// Settle `wager` against the market's state and full wager history
pub fn replay(
    market: &Market,
    wager: &WagerEvent,
    history: &[WagerEvent],
) -> Result<Replay, PayoutError> {
    if !market.is_completed {
        return Ok(Replay {
            status: SettlementStatus::InProgress,
            profit_loss: SignedAmount::ZERO,
        });
    }

    let winning_option = market
        .winning_option
        .as_deref()
        .ok_or(PayoutError::MissingWinningOption)?;

    if wager.chosen_option != winning_option {
        return lost(wager.amount);
    }

    let total_winning = total_winning_volume(market, history, winning_option)?;
    if total_winning.is_zero() {
        warn!(
            "Inconsistent ledger state: market {} has a winning wager but zero winning volume, settling as lost",
            market.market_id
        );
        return lost(wager.amount);
    }

    let net = net_pool(market.prize_pool, market.fee_rate_basis_points)?;
    let reward = reward(wager.amount, net, total_winning)?;

    Ok(Replay {
        status: SettlementStatus::Won,
        profit_loss: signed(reward)? - signed(wager.amount)?,
    })
}
