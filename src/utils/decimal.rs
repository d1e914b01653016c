//! Decimal arithmetic utilities for rate and spread calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::str::FromStr;

/// Round a decimal to a specific number of decimal places.
pub fn round_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp(decimals)
}

/// Convert a fractional rate to percentage points (0.0001 -> 0.01).
///
/// `None` when the result leaves decimal range.
pub fn to_percent(rate: Decimal) -> Option<Decimal> {
    rate.checked_mul(dec!(100))
}

/// Safe division that returns zero if divisor is zero.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator == Decimal::ZERO {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Parse a decimal from an exchange string, accepting scientific notation.
///
/// Returns `None` for empty or unparseable input.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Read a decimal out of a JSON value that may be a string or a number.
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                parse_decimal(&n.to_string())
            }
        }
        _ => None,
    }
}

/// Read an integer (e.g. an epoch timestamp) from a string or number.
pub fn i64_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_percent() {
        assert_eq!(to_percent(dec!(0.0001)), Some(dec!(0.01)));
        assert_eq!(to_percent(dec!(-0.0002)), Some(dec!(-0.02)));
        assert_eq!(to_percent(Decimal::MAX), None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("0.00010000"), Some(dec!(0.0001)));
        assert_eq!(parse_decimal("1e-4"), Some(dec!(0.0001)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_decimal_from_json() {
        assert_eq!(decimal_from_json(&json!("-0.0002")), Some(dec!(-0.0002)));
        assert_eq!(decimal_from_json(&json!(0.0001)), Some(dec!(0.0001)));
        assert_eq!(decimal_from_json(&json!(8)), Some(dec!(8)));
        assert_eq!(decimal_from_json(&json!(null)), None);
    }

    #[test]
    fn test_i64_from_json() {
        assert_eq!(i64_from_json(&json!(1700000000000_i64)), Some(1700000000000));
        assert_eq!(i64_from_json(&json!("1700000000000")), Some(1700000000000));
        assert_eq!(i64_from_json(&json!(true)), None);
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(dec!(24), dec!(0)), Decimal::ZERO);
        assert_eq!(safe_div(dec!(24), dec!(4)), dec!(6));
    }
}
