use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::services::engine::classify::{classify, is_overload, Thresholds};
use crate::services::engine::Reading;
use crate::store::Channel;

/// Device-payload date format, rewritten to the canonical layout before
/// storage so the engine's normalizer accepts it.
const DEVICE_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";
const STORED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One raw field-named record as delivered by the upstream pipeline. The
/// Portuguese field names are the device contract; the English ones are
/// accepted for hand-written payloads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "fk_sensor")]
    pub channel: JsonValue,
    #[serde(default, alias = "valor")]
    pub value: JsonValue,
    #[serde(default, alias = "data_captura")]
    pub timestamp: JsonValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Flattens an ingest body into records: a single object counts as a
/// one-element batch.
pub fn json_records(body: &JsonValue) -> Result<Vec<RawRecord>> {
    let items: Vec<JsonValue> = match body {
        JsonValue::Array(items) => items.clone(),
        JsonValue::Object(_) => vec![body.clone()],
        _ => anyhow::bail!("ingest body must be a JSON object or array"),
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).context("malformed ingest record"))
        .collect()
}

/// Parses a CSV ingest body (`fk_sensor,valor,data_captura` header, UTF-8
/// BOM tolerated). Rows that fail to parse are skipped, not fatal.
pub fn csv_records(body: &str) -> Result<Vec<RawRecord>> {
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers().context("missing CSV header row")?.clone();
    let column = |names: &[&str]| -> Option<usize> {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let channel_col = column(&["fk_sensor", "channel"]);
    let value_col = column(&["valor", "value"]);
    let timestamp_col = column(&["data_captura", "timestamp"]);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(error = %err, "skipping unreadable CSV row");
                continue;
            }
        };
        let cell = |col: Option<usize>| {
            col.and_then(|i| row.get(i))
                .map(|text| JsonValue::String(text.to_string()))
                .unwrap_or(JsonValue::Null)
        };
        records.push(RawRecord {
            channel: cell(channel_col),
            value: cell(value_col),
            timestamp: cell(timestamp_col),
        });
    }
    Ok(records)
}

/// Coerces a raw record into its destination channel and a storable reading.
/// `None` means the record is dropped (missing fields, unknown channel token,
/// or a non-numeric value); the batch continues either way.
///
/// Current-channel readings are annotated with the classified state and the
/// overload flag so served series can carry them through unchanged.
pub fn coerce(record: &RawRecord, thresholds: &Thresholds) -> Option<(Channel, Reading)> {
    let token = channel_token(&record.channel)?;
    let channel = Channel::from_fk(&token).or_else(|| Channel::from_slug(&token))?;

    let value = numeric_value(&record.value)?;
    if !value.is_finite() {
        return None;
    }

    let timestamp = normalize_device_timestamp(&record.timestamp)?;

    let mut reading = Reading::new(value, timestamp);
    if channel == Channel::Current {
        let state = classify(value, thresholds);
        reading.fields.insert("state".to_string(), json!(state.as_str()));
        reading
            .fields
            .insert("overload".to_string(), json!(is_overload(value, thresholds)));
    }
    Some((channel, reading))
}

/// Coerces a whole batch and reports how many records were dropped.
pub fn coerce_batch(
    records: &[RawRecord],
    thresholds: &Thresholds,
) -> (Vec<(Channel, Reading)>, usize) {
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        match coerce(record, thresholds) {
            Some(row) => rows.push(row),
            None => {
                skipped += 1;
                warn!(record = ?record, "skipping unusable ingest record");
            }
        }
    }
    (rows, skipped)
}

fn channel_token(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn numeric_value(raw: &JsonValue) -> Option<f64> {
    match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Device payloads use `DD/MM/YYYY HH:MM`; those are rewritten to the stored
/// `YYYY-MM-DD HH:MM` layout. Every other shape is kept verbatim for the
/// engine's normalizer to judge.
fn normalize_device_timestamp(raw: &JsonValue) -> Option<JsonValue> {
    match raw {
        JsonValue::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            match NaiveDateTime::parse_from_str(text, DEVICE_DATE_FORMAT) {
                Ok(dt) => Some(JsonValue::String(dt.format(STORED_DATE_FORMAT).to_string())),
                Err(_) => Some(JsonValue::String(text.to_string())),
            }
        }
        JsonValue::Number(_) => Some(raw.clone()),
        _ => None,
    }
}
