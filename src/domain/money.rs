use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Money is represented as integer cents to avoid floating-point precision issues.
/// 1 currency unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = i64;

/// Format cents as a human-readable currency string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal string into cents, rounding half-up to 2 decimal places.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "0.005" -> 1
pub fn parse_cents(input: &str) -> Result<Cents, ParseMoneyError> {
    let amount: Decimal = input
        .trim()
        .parse()
        .map_err(|_| ParseMoneyError::InvalidFormat)?;
    cents_from_decimal(amount)
}

/// Convert a decimal currency amount into cents, rounding half-up to 2 decimal places.
pub fn cents_from_decimal(amount: Decimal) -> Result<Cents, ParseMoneyError> {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (rounded * Decimal::from(100))
        .to_i64()
        .ok_or(ParseMoneyError::OutOfRange)
}

/// Convert cents back into a decimal currency amount (2 decimal places).
pub fn decimal_from_cents(cents: Cents) -> Decimal {
    Decimal::new(cents, 2)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMoneyError {
    InvalidFormat,
    OutOfRange,
}

impl fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMoneyError::InvalidFormat => write!(f, "invalid money format"),
            ParseMoneyError::OutOfRange => write!(f, "amount out of range"),
        }
    }
}

impl std::error::Error for ParseMoneyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5000), "50.00");
        assert_eq!(format_cents(1234), "12.34");
        assert_eq!(format_cents(100), "1.00");
        assert_eq!(format_cents(1), "0.01");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(-5000), "-50.00");
        assert_eq!(format_cents(-1), "-0.01");
    }

    #[test]
    fn test_parse_cents() {
        assert_eq!(parse_cents("50.00"), Ok(5000));
        assert_eq!(parse_cents("50"), Ok(5000));
        assert_eq!(parse_cents("12.34"), Ok(1234));
        assert_eq!(parse_cents("12.5"), Ok(1250));
        assert_eq!(parse_cents("0.01"), Ok(1));
        assert_eq!(parse_cents("-50.00"), Ok(-5000));
    }

    #[test]
    fn test_parse_cents_rounds_half_up() {
        assert_eq!(parse_cents("100.995"), Ok(10100));
        assert_eq!(parse_cents("100.994"), Ok(10099));
        assert_eq!(parse_cents("0.005"), Ok(1));
        assert_eq!(parse_cents("-0.005"), Ok(-1));
    }

    #[test]
    fn test_parse_cents_invalid() {
        assert!(parse_cents("abc").is_err());
        assert!(parse_cents("12.34.56").is_err());
        assert!(parse_cents("").is_err());
    }

    #[test]
    fn test_decimal_roundtrip() {
        assert_eq!(decimal_from_cents(5000).to_string(), "50.00");
        assert_eq!(cents_from_decimal(decimal_from_cents(1234)), Ok(1234));
    }
}
