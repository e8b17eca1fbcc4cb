//! Coercion of keyboard input to numbers.
//!
//! Head counts are whole numbers; areas and distances are decimals handled
//! with `rust_decimal::Decimal` so that `0.1 + 0.2` hectares sum exactly.
//! Both `.` and `,` are accepted as the decimal separator.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::types::RuleViolation;

/// Parse a whole number within `[min, max]`.
pub fn parse_integer(raw: &str, min: i64, max: i64) -> Result<i64, RuleViolation> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RuleViolation::NotANumber);
    }
    let value = match trimmed.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            // "3.5" is a number, just not a whole one.
            return Err(if parse_decimal_text(trimmed).is_some() {
                RuleViolation::NotAWholeNumber
            } else {
                RuleViolation::NotANumber
            });
        }
    };
    if value < min || value > max {
        return Err(RuleViolation::OutOfRange { min, max });
    }
    Ok(value)
}

/// Parse a strictly positive decimal.
pub fn parse_positive_decimal(raw: &str) -> Result<Decimal, RuleViolation> {
    let value = parse_decimal_text(raw.trim()).ok_or(RuleViolation::NotANumber)?;
    if value <= Decimal::ZERO {
        return Err(RuleViolation::NotPositive);
    }
    Ok(value.normalize())
}

fn parse_decimal_text(s: &str) -> Option<Decimal> {
    if s.is_empty() || s.matches([',', '.']).count() > 1 {
        return None;
    }
    Decimal::from_str(&s.replace(',', ".")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn integers_in_range() {
        assert_eq!(parse_integer(" 12 ", 1, 40), Ok(12));
        assert_eq!(
            parse_integer("41", 1, 40),
            Err(RuleViolation::OutOfRange { min: 1, max: 40 })
        );
        assert_eq!(
            parse_integer("0", 1, 40),
            Err(RuleViolation::OutOfRange { min: 1, max: 40 })
        );
    }

    #[test]
    fn non_numeric_integer_input_is_a_domain_error() {
        assert_eq!(parse_integer("tres", 1, 10), Err(RuleViolation::NotANumber));
        assert_eq!(parse_integer("3.5", 1, 10), Err(RuleViolation::NotAWholeNumber));
        assert_eq!(parse_integer("", 1, 10), Err(RuleViolation::NotANumber));
    }

    #[test]
    fn decimals_accept_comma_separator() {
        assert_eq!(parse_positive_decimal("2,5"), Ok(dec("2.5")));
        assert_eq!(parse_positive_decimal("0.75"), Ok(dec("0.75")));
        assert_eq!(parse_positive_decimal("1.50"), Ok(dec("1.5")));
    }

    #[test]
    fn non_positive_decimals_rejected() {
        assert_eq!(parse_positive_decimal("0"), Err(RuleViolation::NotPositive));
        assert_eq!(parse_positive_decimal("-3"), Err(RuleViolation::NotPositive));
        assert_eq!(parse_positive_decimal("abc"), Err(RuleViolation::NotANumber));
        assert_eq!(parse_positive_decimal("1.000,5"), Err(RuleViolation::NotANumber));
    }
}
