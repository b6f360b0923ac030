//! Amount parsing for price fields.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

use super::patterns::AMOUNT_PATTERN;

/// Parse the first amount in `text`.
///
/// Handles `1 234,56`, `1234.56` and `1,234.56`; a currency code or
/// symbol around the number is ignored.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let caps = AMOUNT_PATTERN.captures(text)?;
    let integer_part = caps[1].replace([' ', '\u{00a0}', ','], "");
    let amount_str = match caps.get(2) {
        Some(fraction) => format!("{}.{}", integer_part, fraction.as_str()),
        None => integer_part,
    };
    Decimal::from_str(&amount_str).ok()
}

/// Parse an amount as a float; a blank value is zero.
pub fn parse_price(text: &str) -> Option<f64> {
    if text.trim().is_empty() {
        return Some(0.0);
    }
    parse_amount(text)?.to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1 234,56"), Some(Decimal::from_str("1234.56").unwrap()));
        assert_eq!(parse_amount("1234.56"), Some(Decimal::from_str("1234.56").unwrap()));
        assert_eq!(parse_amount("1,234.56"), Some(Decimal::from_str("1234.56").unwrap()));
        assert_eq!(parse_amount("150 EUR"), Some(Decimal::from(150)));
        assert_eq!(parse_amount("$ 99.5"), Some(Decimal::from_str("99.5").unwrap()));
        assert_eq!(parse_amount("free"), None);
    }

    #[test]
    fn test_parse_amount_keeps_every_decimal() {
        assert_eq!(parse_amount("1.234"), Some(Decimal::from_str("1.234").unwrap()));
        assert_eq!(parse_amount("0.125 EUR"), Some(Decimal::from_str("0.125").unwrap()));
        assert_eq!(parse_amount("120,50"), Some(Decimal::from_str("120.50").unwrap()));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("120,50"), Some(120.5));
        assert_eq!(parse_price(""), Some(0.0));
        assert_eq!(parse_price("n/a"), None);
    }
}
