//! Token amount parsing and base-unit conversion.
//!
//! Human readable amounts are carried as [`Decimal`]. Anything that is
//! compared across quotes or sent on-chain is converted to integer base
//! units first, so comparisons never go through floating point.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{IntentError, Result};

/// Parse a caller supplied decimal string into a strictly positive amount.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|e| IntentError::InvalidAmount(format!("{}: {}", raw, e)))?;

    if value <= Decimal::ZERO {
        return Err(IntentError::InvalidAmount(format!(
            "amount must be positive, got {}",
            raw
        )));
    }

    Ok(value)
}

/// Convert a human readable amount into integer base units.
///
/// Fails when the amount is negative, carries more fractional digits than
/// the token supports, or does not fit in 128 bits.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u128> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(IntentError::InvalidAmount(format!(
            "negative amount {}",
            amount
        )));
    }

    let amount = amount.normalize();
    let scale = amount.scale();
    if scale > decimals {
        return Err(IntentError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, decimals
        )));
    }

    let overflow = || IntentError::InvalidAmount(format!("{} overflows base units", amount));
    let mantissa = u128::try_from(amount.mantissa().abs()).map_err(|_| overflow())?;
    let factor = 10u128.checked_pow(decimals - scale).ok_or_else(overflow)?;
    mantissa.checked_mul(factor).ok_or_else(overflow)
}

/// Convert integer base units back into a human readable amount.
pub fn from_base_units(raw: u128, decimals: u32) -> Result<Decimal> {
    let raw = i128::try_from(raw)
        .map_err(|_| IntentError::InvalidAmount(format!("{} exceeds decimal range", raw)))?;

    Decimal::try_from_i128_with_scale(raw, decimals)
        .map(|d| d.normalize())
        .map_err(|e| IntentError::InvalidAmount(e.to_string()))
}
