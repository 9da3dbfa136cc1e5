//! TTL Normalization Module
//!
//! Collapses the supported expiration shapes into a single seconds-to-live
//! value handed to the storage driver.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::cache::key::json_type_name;
use crate::error::{CacheError, Result};

// == TTL Spec ==
/// An expiration as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TtlSpec {
    /// Use the facade's default TTL
    #[default]
    Default,
    /// Relative seconds, or an absolute UNIX timestamp when larger than now
    Seconds(i64),
    /// Relative phrase (`+1 week`) or absolute date string
    DateString(String),
    /// Interval added to now
    Interval(Duration),
    /// Absolute expiration instant
    At(DateTime<Utc>),
}

impl TtlSpec {
    /// Coerces a JSON value into a TTL spec.
    ///
    /// `null` is the default TTL and integers are seconds. Outside strict mode
    /// numeric strings and floats are truncated to integer seconds. Any other
    /// string is treated as a date string; any other shape is a type error.
    pub fn from_json(value: &Value, strict: bool) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Default),
            Value::Number(n) => {
                if let Some(seconds) = n.as_i64() {
                    return Ok(Self::Seconds(seconds));
                }
                if n.is_u64() {
                    return Err(CacheError::invalid_ttl(&n.to_string()));
                }
                match n.as_f64() {
                    Some(f) if !strict => truncate(f)
                        .map(Self::Seconds)
                        .ok_or_else(|| CacheError::invalid_ttl(&n.to_string())),
                    _ => Err(ttl_type_error(value)),
                }
            }
            Value::String(s) => {
                if !strict {
                    if let Some(seconds) = numeric_string(s) {
                        return Ok(Self::Seconds(seconds));
                    }
                }
                Ok(Self::DateString(s.clone()))
            }
            other => Err(ttl_type_error(other)),
        }
    }
}

impl From<i64> for TtlSpec {
    fn from(seconds: i64) -> Self {
        Self::Seconds(seconds)
    }
}

impl From<i32> for TtlSpec {
    fn from(seconds: i32) -> Self {
        Self::Seconds(i64::from(seconds))
    }
}

impl From<&str> for TtlSpec {
    fn from(s: &str) -> Self {
        Self::DateString(s.to_string())
    }
}

impl From<String> for TtlSpec {
    fn from(s: String) -> Self {
        Self::DateString(s)
    }
}

impl From<Duration> for TtlSpec {
    fn from(interval: Duration) -> Self {
        Self::Interval(interval)
    }
}

impl From<DateTime<Utc>> for TtlSpec {
    fn from(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }
}

impl<T: Into<TtlSpec>> From<Option<T>> for TtlSpec {
    fn from(ttl: Option<T>) -> Self {
        ttl.map_or(Self::Default, Into::into)
    }
}

// == Normalize ==
/// Resolves `spec` into seconds-to-live relative to `now` (UNIX seconds).
///
/// Integers larger than `now` are absolute timestamps; non-negative integers up
/// to and including `now` are relative seconds. A result of `0` is passed
/// through as the backend-default sentinel.
///
/// # Errors
/// `InvalidArgument` for negative seconds, expirations in the past and
/// unparseable date strings.
pub fn normalize(spec: &TtlSpec, now: i64, default_ttl: u64) -> Result<u64> {
    match spec {
        TtlSpec::Default => Ok(default_ttl),
        TtlSpec::Seconds(n) => {
            let n = *n;
            if n > now {
                return seconds_until(n, now, &n.to_string());
            }
            if n < 0 {
                return Err(CacheError::negative_ttl(n));
            }
            Ok(n as u64)
        }
        TtlSpec::DateString(input) => {
            let anchor = Utc
                .timestamp_opt(now, 0)
                .single()
                .ok_or_else(|| CacheError::invalid_ttl(input))?;
            let resolved =
                resolve_date_string(input, anchor).ok_or_else(|| CacheError::invalid_ttl(input))?;
            let expires = resolved.timestamp();
            if expires > now {
                seconds_until(expires, now, input)
            } else {
                Err(CacheError::date_in_past(input))
            }
        }
        TtlSpec::Interval(interval) => {
            let seconds = interval.num_seconds();
            if seconds < 0 {
                return Err(CacheError::interval_in_past());
            }
            Ok(seconds as u64)
        }
        TtlSpec::At(at) => {
            let expires = at.timestamp();
            if expires > now {
                seconds_until(expires, now, &at.to_rfc3339())
            } else {
                Err(CacheError::date_in_past(&at.to_rfc3339()))
            }
        }
    }
}

/// Distance from `now` to a later `expires`. Overflow is an invalid TTL.
fn seconds_until(expires: i64, now: i64, input: &str) -> Result<u64> {
    expires
        .checked_sub(now)
        .and_then(|seconds| u64::try_from(seconds).ok())
        .ok_or_else(|| CacheError::invalid_ttl(input))
}

/// Converts a default TTL interval into seconds, rejecting negative values.
pub fn default_from_interval(interval: Duration) -> Result<u64> {
    let seconds = interval.num_seconds();
    if seconds < 0 {
        return Err(CacheError::InvalidArgument(format!(
            "The default TTL can not be a negative number. You supplied {}.",
            seconds
        )));
    }
    Ok(seconds as u64)
}

/// Validates an integer default TTL.
pub fn default_from_seconds(seconds: i64) -> Result<u64> {
    u64::try_from(seconds).map_err(|_| {
        CacheError::InvalidArgument(format!(
            "The default TTL can not be a negative number. You supplied {}.",
            seconds
        ))
    })
}

// == Date String Parsing ==
/// Resolves a relative or absolute date string against `now`.
pub fn resolve_date_string(input: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let raw = input.trim();
    if raw.is_empty() {
        return None;
    }
    let text = raw.to_ascii_lowercase();

    if let Some(epoch) = text.strip_prefix('@') {
        return epoch
            .parse::<i64>()
            .ok()
            .and_then(|s| Utc.timestamp_opt(s, 0).single());
    }

    match text.as_str() {
        "now" => return Some(now),
        "today" | "midnight" => return midnight(now, 0),
        "tomorrow" => return midnight(now, 1),
        "yesterday" => return midnight(now, -1),
        _ => {}
    }

    parse_absolute(raw)
        .or_else(|| parse_relative(&text, now))
        .or_else(|| parse_compact(&text, now))
}

fn midnight(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let date = now
        .date_naive()
        .checked_add_signed(Duration::try_days(days)?)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn parse_absolute(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Copy)]
enum Unit {
    Seconds(i64),
    Months(i64),
}

fn unit(token: &str) -> Option<Unit> {
    let unit = match token {
        "sec" | "secs" | "second" | "seconds" | "s" => Unit::Seconds(1),
        "min" | "mins" | "minute" | "minutes" => Unit::Seconds(60),
        "hour" | "hours" | "h" => Unit::Seconds(3_600),
        "day" | "days" | "d" => Unit::Seconds(86_400),
        "week" | "weeks" | "w" => Unit::Seconds(604_800),
        "fortnight" | "fortnights" => Unit::Seconds(1_209_600),
        "month" | "months" => Unit::Months(1),
        "year" | "years" => Unit::Months(12),
        _ => return None,
    };
    Some(unit)
}

fn amount(token: &str) -> Option<i64> {
    match token {
        "next" | "a" | "an" => Some(1),
        "last" | "previous" => Some(-1),
        "this" => Some(0),
        _ => token.strip_prefix('+').unwrap_or(token).parse::<i64>().ok(),
    }
}

/// Splits tokens such as `+2hours` into `+2` and `hours`.
fn split_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for word in text.split_whitespace() {
        let digits_end = word
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '+' || *c == '-'))))
            .map(|(i, _)| i);
        match digits_end {
            Some(i) if i > 0 && word[..i].chars().any(|c| c.is_ascii_digit()) => {
                tokens.push(&word[..i]);
                tokens.push(&word[i..]);
            }
            _ => tokens.push(word),
        }
    }
    tokens
}

fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut tokens = split_tokens(text);
    let sign = if tokens.last() == Some(&"ago") {
        tokens.pop();
        -1
    } else {
        1
    };
    if tokens.is_empty() || tokens.len() % 2 != 0 {
        return None;
    }

    let mut resolved = now;
    for pair in tokens.chunks(2) {
        let n = amount(pair[0])?.checked_mul(sign)?;
        resolved = match unit(pair[1])? {
            Unit::Seconds(scale) => {
                resolved.checked_add_signed(Duration::try_seconds(n.checked_mul(scale)?)?)?
            }
            Unit::Months(scale) => {
                let months = n.checked_mul(scale)?;
                let delta = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
                if months >= 0 {
                    resolved.checked_add_months(delta)?
                } else {
                    resolved.checked_sub_months(delta)?
                }
            }
        };
    }
    Some(resolved)
}

fn parse_compact(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let span = humantime::parse_duration(text).ok()?;
    now.checked_add_signed(Duration::from_std(span).ok()?)
}

fn numeric_string(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    trimmed.parse::<f64>().ok().and_then(truncate)
}

fn truncate(f: f64) -> Option<i64> {
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn ttl_type_error(value: &Value) -> CacheError {
    CacheError::TypeError(format!(
        "The cache TTL argument must be an interval, integer, or a string. You supplied type {}.",
        json_type_name(value)
    ))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2023-11-14T22:13:20Z
    const NOW: i64 = 1_700_000_000;

    fn anchor() -> DateTime<Utc> {
        Utc.timestamp_opt(NOW, 0).unwrap()
    }

    #[test]
    fn test_default_passes_through() {
        assert_eq!(normalize(&TtlSpec::Default, NOW, 300).unwrap(), 300);
        assert_eq!(normalize(&TtlSpec::Default, NOW, 0).unwrap(), 0);
    }

    #[test]
    fn test_small_integer_is_relative() {
        assert_eq!(normalize(&TtlSpec::Seconds(27), NOW, 0).unwrap(), 27);
        assert_eq!(normalize(&TtlSpec::Seconds(0), NOW, 300).unwrap(), 0);
    }

    #[test]
    fn test_large_integer_is_timestamp() {
        assert_eq!(normalize(&TtlSpec::Seconds(NOW + 90), NOW, 0).unwrap(), 90);
    }

    #[test]
    fn test_integer_equal_to_now_is_relative() {
        assert_eq!(normalize(&TtlSpec::Seconds(NOW), NOW, 0).unwrap(), NOW as u64);
    }

    #[test]
    fn test_extreme_clock_is_rejected_not_overflowed() {
        let far = normalize(&TtlSpec::Seconds(i64::MAX), i64::MIN + 5, 0);
        assert!(matches!(far, Err(CacheError::InvalidArgument(_))));

        let at = TtlSpec::At(anchor() + Duration::days(1));
        assert!(matches!(normalize(&at, i64::MIN + 5, 0), Err(CacheError::InvalidArgument(_))));
    }

    #[test]
    fn test_negative_integer_rejected() {
        let result = normalize(&TtlSpec::Seconds(-1), NOW, 0);
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }

    #[test]
    fn test_relative_phrases() {
        let week = normalize(&"+1 week".into(), NOW, 0).unwrap();
        assert_eq!(week, 604_800);
        let mixed = normalize(&"+1 week 2 days".into(), NOW, 0).unwrap();
        assert_eq!(mixed, 604_800 + 2 * 86_400);
        let glued = normalize(&"+2hours".into(), NOW, 0).unwrap();
        assert_eq!(glued, 7_200);
        let next = normalize(&"next day".into(), NOW, 0).unwrap();
        assert_eq!(next, 86_400);
    }

    #[test]
    fn test_past_relative_phrases_rejected() {
        for phrase in ["-1 week", "3 hours ago", "last month", "now", "yesterday"] {
            let result = normalize(&phrase.into(), NOW, 0);
            assert!(
                matches!(result, Err(CacheError::InvalidArgument(_))),
                "{} should be rejected",
                phrase
            );
        }
    }

    #[test]
    fn test_month_arithmetic_uses_calendar() {
        // Nov 14 -> Dec 14 is 30 days
        let ttl = normalize(&"+1 month".into(), NOW, 0).unwrap();
        assert_eq!(ttl, 30 * 86_400);
    }

    #[test]
    fn test_tomorrow_is_next_midnight() {
        let ttl = normalize(&"tomorrow".into(), NOW, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2023, 11, 15, 0, 0, 0).unwrap().timestamp();
        assert_eq!(ttl, (midnight - NOW) as u64);
    }

    #[test]
    fn test_absolute_dates() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap().timestamp() - NOW;
        for input in [
            "2030-01-01",
            "2030-01-01 00:00:00",
            "2030-01-01T00:00:00Z",
            "Tue, 1 Jan 2030 00:00:00 +0000",
        ] {
            assert_eq!(normalize(&input.into(), NOW, 0).unwrap(), expected as u64, "{}", input);
        }
        assert!(matches!(
            normalize(&"2001-01-01".into(), NOW, 0),
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_epoch_string() {
        let input = format!("@{}", NOW + 10);
        assert_eq!(normalize(&input.into(), NOW, 0).unwrap(), 10);
    }

    #[test]
    fn test_compact_duration() {
        assert_eq!(normalize(&"1h 30m".into(), NOW, 0).unwrap(), 5_400);
    }

    #[test]
    fn test_garbage_rejected() {
        for input in ["", "whenever", "+1 fortnite", "1 2 3"] {
            let result = normalize(&input.into(), NOW, 0);
            assert!(
                matches!(result, Err(CacheError::InvalidArgument(_))),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_interval() {
        let ttl = normalize(&TtlSpec::Interval(Duration::minutes(5)), NOW, 0).unwrap();
        assert_eq!(ttl, 300);
        let past = normalize(&TtlSpec::Interval(Duration::minutes(-5)), NOW, 0);
        assert!(matches!(past, Err(CacheError::InvalidArgument(_))));
    }

    #[test]
    fn test_absolute_instant() {
        let at = anchor() + Duration::seconds(45);
        assert_eq!(normalize(&TtlSpec::At(at), NOW, 0).unwrap(), 45);
        assert!(normalize(&TtlSpec::At(anchor()), NOW, 0).is_err());
    }

    #[test]
    fn test_from_json_shapes() {
        assert_eq!(TtlSpec::from_json(&json!(null), true).unwrap(), TtlSpec::Default);
        assert_eq!(TtlSpec::from_json(&json!(27), true).unwrap(), TtlSpec::Seconds(27));
        assert_eq!(TtlSpec::from_json(&json!("27"), false).unwrap(), TtlSpec::Seconds(27));
        assert_eq!(TtlSpec::from_json(&json!(27.9), false).unwrap(), TtlSpec::Seconds(27));
        assert_eq!(
            TtlSpec::from_json(&json!("27"), true).unwrap(),
            TtlSpec::DateString("27".to_string())
        );
        assert_eq!(
            TtlSpec::from_json(&json!("+1 day"), false).unwrap(),
            TtlSpec::DateString("+1 day".to_string())
        );
    }

    #[test]
    fn test_from_json_type_errors() {
        for value in [json!(true), json!([1]), json!({"ttl": 1})] {
            assert!(matches!(
                TtlSpec::from_json(&value, false),
                Err(CacheError::TypeError(_))
            ));
        }
        assert!(matches!(
            TtlSpec::from_json(&json!(27.5), true),
            Err(CacheError::TypeError(_))
        ));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(TtlSpec::from(None::<i64>), TtlSpec::Default);
        assert_eq!(TtlSpec::from(Some(60)), TtlSpec::Seconds(60));
    }

    #[test]
    fn test_default_setters() {
        assert_eq!(default_from_seconds(60).unwrap(), 60);
        assert!(default_from_seconds(-1).is_err());
        assert_eq!(default_from_interval(Duration::hours(1)).unwrap(), 3_600);
        assert!(default_from_interval(Duration::hours(-1)).is_err());
    }
}
