//! `Edm.Decimal` helpers over [`BigDecimal`].
//!
//! Wire literals are parsed with a bounded exponent so no value can demand
//! an unbounded rescale. Rounding is always half-to-even.

use bigdecimal::{BigDecimal, RoundingMode};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Largest exponent magnitude accepted in a literal such as `1E+12`.
pub const MAX_EXPONENT: i64 = 4_096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal literal '{0}'")]
pub struct ParseDecimalError(String);

/// Parse `[-+]digits[.digits][(e|E)[-+]digits]`.
pub fn parse(literal: &str) -> Result<BigDecimal, ParseDecimalError> {
    let err = || ParseDecimalError(literal.to_string());
    let text = literal.trim();
    let mantissa = match text.find(['e', 'E']) {
        Some(pos) => {
            let exponent: i64 = text[pos + 1..].parse().map_err(|_| err())?;
            if !(-MAX_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
                return Err(err());
            }
            &text[..pos]
        }
        None => text,
    };
    let unsigned = mantissa.strip_prefix(['-', '+']).unwrap_or(mantissa);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int.is_empty() && frac.is_empty() {
        return Err(err());
    }
    if !int.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(err());
    }
    text.parse().map_err(|_| err())
}

pub fn scale(value: &BigDecimal) -> i64 {
    value.as_bigint_and_exponent().1
}

/// Digits left of the decimal point; zero or negative for pure fractions
/// (`0.001` has -2).
pub fn integer_digits(value: &BigDecimal) -> i64 {
    // digits() never exceeds the literal length, far below i64::MAX
    value.digits() as i64 - scale(value)
}

/// Round to at most `precision` significant digits.
pub fn round_to_precision(value: &BigDecimal, precision: u64) -> BigDecimal {
    let precision = precision.max(1);
    let digits = value.digits();
    if digits <= precision {
        return value.clone();
    }
    let target = scale(value) - (digits - precision) as i64;
    let rounded = value.with_scale_round(target, RoundingMode::HalfEven);
    // 9.995 -> 10.00 carries into an extra digit; the trailing zero is exact.
    if rounded.digits() > precision {
        rounded.with_scale_round(target - 1, RoundingMode::HalfEven)
    } else {
        rounded
    }
}

/// Minimal big-endian two's-complement encoding of the unscaled value.
pub fn to_be_bytes(value: &BigDecimal) -> Vec<u8> {
    value.as_bigint_and_exponent().0.to_signed_bytes_be()
}

/// Whole units toward zero and the remaining fraction, both carrying the
/// sign of `value`.
pub fn split_integer(value: &BigDecimal) -> (BigInt, BigDecimal) {
    let whole = value.with_scale(0);
    let fraction = value - &whole;
    (whole.as_bigint_and_exponent().0, fraction)
}

/// Plain notation without an exponent, keeping the value's scale:
/// `-12.340`, `1000`, `0.05`.
pub fn to_plain_string(value: &BigDecimal) -> String {
    let (unscaled, scale) = value.as_bigint_and_exponent();
    if unscaled.is_zero() && scale <= 0 {
        return "0".to_string();
    }
    let digits = unscaled.magnitude().to_string();
    let sign = if unscaled.is_negative() { "-" } else { "" };
    if scale <= 0 {
        let zeros = "0".repeat(scale.unsigned_abs() as usize);
        return format!("{sign}{digits}{zeros}");
    }
    let scale = scale as usize;
    if digits.len() > scale {
        let (int, frac) = digits.split_at(digits.len() - scale);
        format!("{sign}{int}.{frac}")
    } else {
        let pad = "0".repeat(scale - digits.len());
        format!("{sign}0.{pad}{digits}")
    }
}
