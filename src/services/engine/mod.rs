pub mod classify;
pub mod episodes;
pub mod reliability;
pub mod series;
pub mod timestamp;
pub mod trend;
pub mod vibration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One stored sensor reading as returned by a record-store scan.
///
/// `timestamp` is kept in whatever shape the upstream pipeline delivered it
/// (epoch number, numeric string, or date-time string); it only becomes
/// canonical epoch milliseconds through [`timestamp::normalize`]. `fields`
/// carries channel-specific attributes annotated at ingest time (for the
/// current channel: `state` and `overload`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub timestamp: JsonValue,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

impl Reading {
    pub fn new(value: f64, timestamp: JsonValue) -> Self {
        Self {
            value,
            timestamp,
            fields: Map::new(),
        }
    }
}

/// Normalizes, filters, and time-sorts a scanned reading set into the
/// `(epoch_ms, value)` samples every analysis below operates on.
///
/// Readings whose timestamp fails normalization or whose value is not finite
/// are dropped here; a malformed reading never aborts the batch.
pub fn sorted_samples(readings: &[Reading]) -> Vec<(i64, f64)> {
    let mut samples: Vec<(i64, f64)> = readings
        .iter()
        .filter(|reading| reading.value.is_finite())
        .filter_map(|reading| timestamp::normalize(&reading.timestamp).map(|ts| (ts, reading.value)))
        .collect();
    samples.sort_by_key(|(ts, _)| *ts);
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorted_samples_drops_invalid_and_orders_by_time() {
        let readings = vec![
            Reading::new(3.0, json!("2025-06-01 10:05:00")),
            Reading::new(1.0, json!("2025-06-01 10:00:00")),
            Reading::new(9.9, json!("not a timestamp")),
            Reading::new(f64::NAN, json!("2025-06-01 10:02:00")),
            Reading::new(2.0, json!("2025-06-01 10:02:00")),
        ];

        let samples = sorted_samples(&readings);
        let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert!(samples.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}
