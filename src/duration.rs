//! Human-readable durations for config values such as `request_timeout = "30s"`
//! or `retry_backoff = "500ms"`.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serializer};

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\s*(ms|s|m|h|d)$").expect("duration pattern is valid")
    })
}

/// Parse a duration string like `"250ms"`, `"30s"`, `"5m"`, `"2h"` or `"1d"`.
///
/// Input is case-insensitive and surrounding whitespace is ignored.
///
/// ```
/// use std::time::Duration;
/// use wealthline::duration::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let normalized = s.trim().to_lowercase();
    let captures = duration_pattern()
        .captures(&normalized)
        .with_context(|| format!("Invalid duration {s:?}: expected <number><ms|s|m|h|d>"))?;

    let value: u64 = captures[1]
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;

    let millis_per_unit: u64 = match &captures[2] {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        other => anyhow::bail!("Unsupported duration unit {other:?}"),
    };

    let millis = value
        .checked_mul(millis_per_unit)
        .with_context(|| format!("Duration {s:?} is too large"))?;
    Ok(Duration::from_millis(millis))
}

/// Render a duration using the largest unit that divides it evenly.
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    for (unit, size) in [("d", 86_400_000u128), ("h", 3_600_000), ("m", 60_000), ("s", 1_000)] {
        if millis >= size && millis % size == 0 {
            return format!("{}{unit}", millis / size);
        }
    }
    format!("{millis}ms")
}

/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

/// Use with `#[serde(serialize_with = "serialize_duration")]`.
pub fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_unit() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn ignores_case_and_whitespace() {
        assert_eq!(parse_duration("  10S ").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("15 m").unwrap(), Duration::from_secs(900));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ten seconds").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("5w").is_err());
    }

    #[test]
    fn format_picks_largest_even_unit() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::ZERO), "0ms");
    }

    #[test]
    fn format_and_parse_agree() {
        for text in ["500ms", "45s", "3m", "6h", "2d"] {
            let parsed = parse_duration(text).unwrap();
            assert_eq!(format_duration(parsed), text);
        }
    }
}
