//! Textual durations: `250ms`, `10s`, `1m30s`, `2h`, `1d`.
//!
//! The canonical form lists non-zero components from days down to
//! milliseconds, so `90s` prints as `1m30s`. The zero span prints as `0s`.

use std::time::Duration;

use thiserror::Error;

const UNITS: [(&str, u64); 5] = [
    ("d", 86_400_000),
    ("h", 3_600_000),
    ("m", 60_000),
    ("s", 1_000),
    ("ms", 1),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration '{text}': {reason}")]
pub struct DurationError {
    pub text: String,
    pub reason: &'static str,
}

fn unit_millis(unit: &str) -> Option<u64> {
    UNITS.iter().find(|(u, _)| *u == unit).map(|(_, ms)| *ms)
}

pub fn parse_duration(text: &str) -> Result<Duration, DurationError> {
    let err = |reason| DurationError {
        text: text.to_string(),
        reason,
    };
    if text.is_empty() {
        return Err(err("empty"));
    }
    let bytes = text.as_bytes();
    let mut total: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if start == i {
            return Err(err("expected digits"));
        }
        let amount: u64 = text[start..i].parse().map_err(|_| err("amount out of range"))?;
        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let millis = unit_millis(&text[unit_start..i]).ok_or_else(|| err("unknown unit"))?;
        total = amount
            .checked_mul(millis)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| err("amount out of range"))?;
    }
    Ok(Duration::from_millis(total))
}

pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.as_millis();
    if remaining == 0 {
        return "0s".to_string();
    }
    let mut out = String::new();
    for (unit, ms) in UNITS.iter() {
        let ms = *ms as u128;
        let amount = remaining / ms;
        if amount > 0 {
            out.push_str(&amount.to_string());
            out.push_str(unit);
            remaining -= amount * ms;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_compound_forms() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1d2h").unwrap(), Duration::from_secs(93_600));
        assert_eq!(parse_duration("0s").unwrap(), Duration::from_secs(0));
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10w").is_err());
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("99999999999999999999d").is_err());
    }

    #[test]
    fn formats_canonically() {
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1s500ms");
        assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
    }
}
