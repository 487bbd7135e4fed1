//! Go-style duration strings.
//!
//! Operators configure intervals and timeouts the same way the legacy
//! deployment did: a sequence of decimal numbers, each with a unit suffix,
//! such as `"5s"`, `"250ms"`, `"1m30s"` or `"1.5h"`.
//!
//! Supported units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`.

use std::time::Duration;
use thiserror::Error;

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration '{0}'")]
    Invalid(String),

    #[error("missing unit in duration '{0}'")]
    MissingUnit(String),

    #[error("unknown unit '{unit}' in duration '{input}'")]
    UnknownUnit { unit: String, input: String },

    #[error("duration '{0}' is out of range")]
    Overflow(String),
}

/// Parse a Go-style duration string.
///
/// `"0"` is accepted without a unit. Negative durations are rejected.
///
/// # Errors
///
/// Returns a [`DurationParseError`] describing the first malformed component.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if rest.is_empty() || rest.starts_with('-') {
        return Err(DurationParseError::Invalid(input.to_string()));
    }

    let mut total_nanos: f64 = 0.0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(DurationParseError::Invalid(input.to_string()));
        }
        let (number, after_number) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| DurationParseError::Invalid(input.to_string()))?;

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        if unit_len == 0 {
            return Err(DurationParseError::MissingUnit(input.to_string()));
        }
        let (unit, after_unit) = after_number.split_at(unit_len);

        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60.0 * 1_000_000_000.0,
            "h" => 3_600.0 * 1_000_000_000.0,
            other => {
                return Err(DurationParseError::UnknownUnit {
                    unit: other.to_string(),
                    input: input.to_string(),
                })
            }
        };

        total_nanos += value * nanos_per_unit;
        rest = after_unit;
    }

    #[allow(clippy::cast_precision_loss)]
    let max_nanos = u64::MAX as f64;
    if !total_nanos.is_finite() || total_nanos > max_nanos {
        return Err(DurationParseError::Overflow(input.to_string()));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = total_nanos.round() as u64;
    Ok(Duration::from_nanos(nanos))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_simple_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("15us").unwrap(), Duration::from_micros(15));
        assert_eq!(parse_duration("7ns").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_parses_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(
            parse_duration("1s500ms").unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_zero_without_unit() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_rejects_missing_unit() {
        assert_eq!(
            parse_duration("5"),
            Err(DurationParseError::MissingUnit("5".to_string()))
        );
    }

    #[test]
    fn test_rejects_unknown_unit() {
        assert!(matches!(
            parse_duration("5d"),
            Err(DurationParseError::UnknownUnit { unit, .. }) if unit == "d"
        ));
    }

    #[test]
    fn test_rejects_empty_and_negative() {
        assert_eq!(parse_duration("  "), Err(DurationParseError::Empty));
        assert!(matches!(
            parse_duration("-5s"),
            Err(DurationParseError::Invalid(_))
        ));
        assert!(matches!(
            parse_duration("five seconds"),
            Err(DurationParseError::Invalid(_))
        ));
    }
}
