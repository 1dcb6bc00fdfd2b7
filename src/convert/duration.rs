//! Duration literals such as `1h30m`, `300ms` or `1.5s`.
//!
//! A literal is one or more `<decimal><unit>` pairs with units `ns`, `us`
//! (`µs`, `μs`), `ms`, `s`, `m` and `h`. A bare `0` is accepted. A leading `+`
//! is allowed; negative durations are rejected because `std::time::Duration`
//! is unsigned.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,
    #[error("negative durations are not supported")]
    Negative,
    #[error("missing number")]
    MissingNumber,
    #[error("missing unit")]
    MissingUnit,
    #[error("unknown unit {0:?}")]
    UnknownUnit(String),
    #[error("duration out of range")]
    Overflow,
}

const NANOS_PER_UNIT: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
];

/// Parse a duration literal.
pub fn parse_duration(literal: &str) -> Result<Duration, DurationError> {
    let mut rest = literal;
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    } else if rest.starts_with('-') {
        return Err(DurationError::Negative);
    }

    if rest.is_empty() {
        return Err(DurationError::Empty);
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return Err(DurationError::MissingNumber);
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit);
        }
        let scale = NANOS_PER_UNIT
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, scale)| *scale)
            .ok_or_else(|| DurationError::UnknownUnit(unit.to_string()))?;

        total = total
            .checked_add(scaled(number, scale)?)
            .ok_or(DurationError::Overflow)?;
        rest = tail;
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| DurationError::Overflow)?;
    // The remainder is below one second, so it always fits in u32.
    let nanos = (total % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}

/// `number * scale` in nanoseconds, keeping fractional digits exact down to 1ns.
fn scaled(number: &str, scale: u128) -> Result<u128, DurationError> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
        return Err(DurationError::MissingNumber);
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| DurationError::Overflow)?
    };
    let mut value = whole.checked_mul(scale).ok_or(DurationError::Overflow)?;

    let mut divisor: u128 = 1;
    let mut fractional: u128 = 0;
    for digit in fraction.bytes().take(18) {
        fractional = fractional * 10 + u128::from(digit - b'0');
        divisor *= 10;
    }
    value = value
        .checked_add(fractional * scale / divisor)
        .ok_or(DurationError::Overflow)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_literals() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_duration("2h45m10s").unwrap(), Duration::from_secs(9_910));
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1_500));
        assert_eq!(parse_duration("+10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("7µs").unwrap(), Duration::from_micros(7));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration(".5m").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn malformed_literals() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("-1s"), Err(DurationError::Negative));
        assert_eq!(parse_duration("10"), Err(DurationError::MissingUnit));
        assert_eq!(parse_duration("h"), Err(DurationError::MissingNumber));
        assert_eq!(parse_duration("5d"), Err(DurationError::UnknownUnit("d".into())));
        assert_eq!(parse_duration("1..5s"), Err(DurationError::MissingNumber));
    }
}
