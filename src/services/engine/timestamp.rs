use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

/// Everything above this magnitude is taken to already be epoch milliseconds.
const MILLIS_CUTOFF: i64 = 1_000_000_000_000;
const MILLIS_CUTOFF_F: f64 = 1.0e12;

const FORMAT_WITH_SECONDS: &str = "%Y-%m-%d %H:%M:%S";
const FORMAT_WITHOUT_SECONDS: &str = "%Y-%m-%d %H:%M";

/// Outcome of a single parse attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Parsed(i64),
    Unparseable,
}

type Parser = fn(&JsonValue) -> Attempt;

/// Parse attempts in precedence order: raw numbers, numeric strings, then the
/// two date-time layouts the device fleet emits.
const ATTEMPTS: &[Parser] = &[
    parse_numeric,
    parse_numeric_string,
    parse_datetime_with_seconds,
    parse_datetime_without_seconds,
];

/// Converts a raw timestamp of any supported shape into canonical epoch
/// milliseconds (UTC). Returns `None` when no parser accepts the input; the
/// caller drops the owning reading and keeps going.
///
/// Normalization is idempotent: an already-canonical millisecond value comes
/// back unchanged.
pub fn normalize(raw: &JsonValue) -> Option<i64> {
    ATTEMPTS.iter().find_map(|parser| match parser(raw) {
        Attempt::Parsed(ms) => Some(ms),
        Attempt::Unparseable => None,
    })
}

/// Magnitude rule for integer epochs. Values at or below the seconds range are
/// multiplied into milliseconds; note that millisecond epochs before ~2001
/// fall under the cutoff and are misread as seconds, matching the upstream
/// pipeline's behavior.
fn scale_integer_epoch(n: i64) -> i64 {
    if n.abs() > MILLIS_CUTOFF {
        n
    } else {
        n.saturating_mul(1000)
    }
}

fn scale_float_epoch(n: f64) -> Attempt {
    if !n.is_finite() {
        return Attempt::Unparseable;
    }
    if n.abs() > MILLIS_CUTOFF_F {
        Attempt::Parsed(n as i64)
    } else {
        Attempt::Parsed((n * 1000.0) as i64)
    }
}

fn parse_numeric(raw: &JsonValue) -> Attempt {
    if let Some(n) = raw.as_i64() {
        return Attempt::Parsed(scale_integer_epoch(n));
    }
    if let Some(n) = raw.as_f64() {
        return scale_float_epoch(n);
    }
    Attempt::Unparseable
}

fn parse_numeric_string(raw: &JsonValue) -> Attempt {
    let Some(text) = raw.as_str() else {
        return Attempt::Unparseable;
    };
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Attempt::Parsed(scale_integer_epoch(n));
    }
    if let Ok(n) = text.parse::<f64>() {
        return scale_float_epoch(n);
    }
    Attempt::Unparseable
}

fn parse_datetime(raw: &JsonValue, format: &str) -> Attempt {
    let Some(text) = raw.as_str() else {
        return Attempt::Unparseable;
    };
    match NaiveDateTime::parse_from_str(text.trim(), format) {
        Ok(dt) => Attempt::Parsed(dt.and_utc().timestamp_millis()),
        Err(_) => Attempt::Unparseable,
    }
}

fn parse_datetime_with_seconds(raw: &JsonValue) -> Attempt {
    parse_datetime(raw, FORMAT_WITH_SECONDS)
}

fn parse_datetime_without_seconds(raw: &JsonValue) -> Attempt {
    parse_datetime(raw, FORMAT_WITHOUT_SECONDS)
}
