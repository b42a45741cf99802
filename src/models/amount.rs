//! Ledger-native amounts and their conversion at the presentation boundary.
//!
//! Computation never leaves integer smallest units. Decimals appear only when a
//! result is handed to a human-facing surface.

use alloy_primitives::{I256, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Unsigned amount in the ledger's smallest currency unit
pub type Amount = U256;

/// Signed amount in the ledger's smallest currency unit (profit/loss)
pub type SignedAmount = I256;

/// Convert a ledger amount to a human decimal with `decimals` fractional digits.
///
/// Returns `None` when the amount does not fit a `Decimal` mantissa.
pub fn to_decimal(amount: Amount, decimals: u32) -> Option<Decimal> {
    let units = i128::try_from(u128::try_from(amount).ok()?).ok()?;
    Decimal::try_from_i128_with_scale(units, decimals)
        .ok()
        .map(|d| d.normalize())
}

/// Signed counterpart of [`to_decimal`]
pub fn signed_to_decimal(amount: SignedAmount, decimals: u32) -> Option<Decimal> {
    let magnitude = to_decimal(amount.unsigned_abs(), decimals)?;
    if amount.is_negative() {
        Some(-magnitude)
    } else {
        Some(magnitude)
    }
}

/// Convert a human decimal into ledger units, truncating sub-unit digits.
///
/// Negative or oversized inputs yield `None`.
pub fn from_decimal(value: Decimal, decimals: u32) -> Option<Amount> {
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    let scale = Decimal::try_from_i128_with_scale(10i128.checked_pow(decimals)?, 0).ok()?;
    let units = value.checked_mul(scale)?.trunc().to_u128()?;
    Some(U256::from(units))
}
