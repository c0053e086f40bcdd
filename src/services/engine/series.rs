use std::fmt;

use serde_json::{Map, Value as JsonValue};

use crate::services::engine::classify::OperationalState;
use crate::services::engine::{timestamp, Reading};
use crate::store::Channel;

/// Auxiliary fields carried through on widened current-channel rows.
const CURRENT_WIDEN_FIELDS: &[&str] = &["state", "overload"];

/// Resolved query behavior for one metric identifier. Identifiers are opaque
/// tokens; everything a mode needs (channel, field name, filter value) is
/// carried in the variant so dispatch happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Single row: the reading with the greatest normalized timestamp.
    Latest { channel: Channel },
    /// Every valid reading in ascending time order; `widen` names the
    /// auxiliary fields copied onto each row unchanged.
    Full {
        channel: Channel,
        widen: &'static [&'static str],
    },
    /// One named auxiliary field per reading, with the categorical state
    /// mapping as a fallback for non-numeric values.
    Derived {
        channel: Channel,
        field: &'static str,
    },
    /// Full series restricted to readings whose categorical field equals a
    /// fixed value.
    Filtered {
        channel: Channel,
        field: &'static str,
        equals: &'static str,
    },
}

impl QueryMode {
    /// Metric identifier table. `<slug>` is the raw series for each channel
    /// (widened for current), `<slug>-latest` the newest reading;
    /// `current-state` and `current-loaded` are the derived and filtered
    /// views of the classified current channel.
    pub fn resolve(metric: &str) -> Option<QueryMode> {
        let metric = metric.trim();
        if let Some(slug) = metric.strip_suffix("-latest") {
            return Channel::from_slug(slug).map(|channel| QueryMode::Latest { channel });
        }
        match metric {
            "current" => Some(QueryMode::Full {
                channel: Channel::Current,
                widen: CURRENT_WIDEN_FIELDS,
            }),
            "current-state" => Some(QueryMode::Derived {
                channel: Channel::Current,
                field: "state",
            }),
            "current-loaded" => Some(QueryMode::Filtered {
                channel: Channel::Current,
                field: "state",
                equals: "Loaded",
            }),
            other => Channel::from_slug(other).map(|channel| QueryMode::Full {
                channel,
                widen: &[],
            }),
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            QueryMode::Latest { channel }
            | QueryMode::Full { channel, .. }
            | QueryMode::Derived { channel, .. }
            | QueryMode::Filtered { channel, .. } => *channel,
        }
    }
}

/// One served series row: value, canonical timestamp, and any widened
/// auxiliary fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub value: f64,
    pub ts_ms: i64,
    pub extra: Map<String, JsonValue>,
}

/// Distinguished non-crash outcomes of a series query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    /// The identifier resolved to no known query mode.
    InvalidMetric(String),
    /// Nothing left after normalization and filtering.
    Empty,
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesError::InvalidMetric(metric) => write!(f, "unknown metric '{metric}'"),
            SeriesError::Empty => write!(f, "no readings matched the query"),
        }
    }
}

impl std::error::Error for SeriesError {}

/// Resolves `metric` and runs it over one channel's scanned readings.
pub fn query(metric: &str, readings: &[Reading]) -> Result<Vec<SeriesRow>, SeriesError> {
    let mode =
        QueryMode::resolve(metric).ok_or_else(|| SeriesError::InvalidMetric(metric.to_string()))?;
    run(&mode, readings)
}

/// Runs a resolved query mode. Readings failing timestamp normalization or
/// carrying a non-finite value are silently excluded; an empty result is the
/// distinguished [`SeriesError::Empty`] outcome, never a panic.
pub fn run(mode: &QueryMode, readings: &[Reading]) -> Result<Vec<SeriesRow>, SeriesError> {
    let mut valid: Vec<(i64, &Reading)> = readings
        .iter()
        .filter(|reading| reading.value.is_finite())
        .filter_map(|reading| timestamp::normalize(&reading.timestamp).map(|ts| (ts, reading)))
        .collect();
    valid.sort_by_key(|(ts, _)| *ts);

    let rows: Vec<SeriesRow> = match mode {
        QueryMode::Latest { .. } => valid
            .last()
            .map(|&(ts, reading)| vec![plain_row(ts, reading.value)])
            .unwrap_or_default(),
        QueryMode::Full { widen, .. } => valid
            .iter()
            .map(|&(ts, reading)| widened_row(ts, reading, widen))
            .collect(),
        QueryMode::Derived { field, .. } => valid
            .iter()
            .filter_map(|&(ts, reading)| {
                derived_value(reading.fields.get(*field)).map(|value| plain_row(ts, value))
            })
            .collect(),
        QueryMode::Filtered { field, equals, .. } => valid
            .iter()
            .filter(|(_, reading)| {
                reading
                    .fields
                    .get(*field)
                    .and_then(JsonValue::as_str)
                    .is_some_and(|label| label == *equals)
            })
            .map(|&(ts, reading)| plain_row(ts, reading.value))
            .collect(),
    };

    if rows.is_empty() {
        Err(SeriesError::Empty)
    } else {
        Ok(rows)
    }
}

fn plain_row(ts_ms: i64, value: f64) -> SeriesRow {
    SeriesRow {
        value,
        ts_ms,
        extra: Map::new(),
    }
}

fn widened_row(ts_ms: i64, reading: &Reading, widen: &[&str]) -> SeriesRow {
    let mut extra = Map::new();
    for name in widen {
        if let Some(value) = reading.fields.get(*name) {
            extra.insert((*name).to_string(), value.clone());
        }
    }
    SeriesRow {
        value: reading.value,
        ts_ms,
        extra,
    }
}

/// Numeric fields pass through; categorical state labels fall back to the
/// `{Loaded→1.0, Idle→0.5, Off→0.0}` mapping. Anything else skips the row.
fn derived_value(field: Option<&JsonValue>) -> Option<f64> {
    let field = field?;
    if let Some(n) = field.as_f64() {
        return Some(n);
    }
    field
        .as_str()
        .and_then(OperationalState::from_label)
        .map(OperationalState::level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(value: f64, ts: JsonValue) -> Reading {
        Reading::new(value, ts)
    }

    fn current_reading(value: f64, ts: JsonValue, state: &str, overload: bool) -> Reading {
        let mut r = Reading::new(value, ts);
        r.fields.insert("state".to_string(), json!(state));
        r.fields.insert("overload".to_string(), json!(overload));
        r
    }

    #[test]
    fn resolve_covers_the_metric_table() {
        assert_eq!(
            QueryMode::resolve("vibration"),
            Some(QueryMode::Full {
                channel: Channel::Vibration,
                widen: &[],
            })
        );
        assert_eq!(
            QueryMode::resolve("pressure-latest"),
            Some(QueryMode::Latest {
                channel: Channel::Pressure
            })
        );
        assert!(matches!(
            QueryMode::resolve("current"),
            Some(QueryMode::Full { .. })
        ));
        assert!(matches!(
            QueryMode::resolve("current-state"),
            Some(QueryMode::Derived { field: "state", .. })
        ));
        assert_eq!(QueryMode::resolve("humidity"), None);
        assert_eq!(QueryMode::resolve("humidity-latest"), None);
    }

    #[test]
    fn full_series_drops_invalid_readings_and_sorts() {
        let readings = vec![
            reading(3.0, json!("2025-06-01 10:10")),
            reading(1.0, json!("2025-06-01 10:00")),
            reading(2.0, json!("2025-06-01 10:05")),
            reading(99.0, json!("not a timestamp")),
        ];
        let rows = query("voltage", &readings).unwrap();
        assert_eq!(rows.len(), 3);
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert!(rows.windows(2).all(|w| w[0].ts_ms <= w[1].ts_ms));
    }

    #[test]
    fn widened_rows_carry_auxiliary_fields_through() {
        let readings = vec![current_reading(20.0, json!("2025-06-01 10:00"), "Loaded", false)];
        let rows = query("current", &readings).unwrap();
        assert_eq!(rows[0].extra.get("state"), Some(&json!("Loaded")));
        assert_eq!(rows[0].extra.get("overload"), Some(&json!(false)));
    }

    #[test]
    fn latest_returns_the_newest_reading_only() {
        let readings = vec![
            reading(1.0, json!("2025-06-01 10:00")),
            reading(2.0, json!("2025-06-01 11:00")),
            reading(3.0, json!("2025-06-01 10:30")),
        ];
        let rows = query("temperature-latest", &readings).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 2.0);
    }

    #[test]
    fn derived_metric_maps_categorical_states_to_levels() {
        let readings = vec![
            current_reading(20.0, json!("2025-06-01 10:00"), "Loaded", false),
            current_reading(3.0, json!("2025-06-01 10:05"), "Idle", false),
            current_reading(0.1, json!("2025-06-01 10:10"), "Off", false),
            // Missing field: skipped, not an error.
            reading(5.0, json!("2025-06-01 10:15")),
        ];
        let rows = query("current-state", &readings).unwrap();
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn derived_metric_passes_numeric_fields_through() {
        let mut r = reading(20.0, json!("2025-06-01 10:00"));
        r.fields.insert("state".to_string(), json!(0.75));
        let rows = query("current-state", &[r]).unwrap();
        assert_eq!(rows[0].value, 0.75);
    }

    #[test]
    fn filtered_series_keeps_only_matching_rows() {
        let readings = vec![
            current_reading(20.0, json!("2025-06-01 10:00"), "Loaded", false),
            current_reading(3.0, json!("2025-06-01 10:05"), "Idle", false),
            current_reading(25.0, json!("2025-06-01 10:10"), "Loaded", false),
        ];
        let rows = query("current-loaded", &readings).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.value >= 10.0));
    }

    #[test]
    fn distinguished_outcomes_for_unknown_and_empty() {
        assert_eq!(
            query("bogus", &[]),
            Err(SeriesError::InvalidMetric("bogus".to_string()))
        );
        assert_eq!(query("voltage", &[]), Err(SeriesError::Empty));

        // Valid metric, but everything filtered out.
        let readings = vec![current_reading(3.0, json!("2025-06-01 10:05"), "Idle", false)];
        assert_eq!(query("current-loaded", &readings), Err(SeriesError::Empty));
    }
}
