use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::services::engine::Reading;

/// The six sensor channels of the monitored machine. The numeric tokens are
/// the `fk_sensor` identifiers the upstream device payloads carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Current,
    Voltage,
    Temperature,
    Vibration,
    Pressure,
    Frequency,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Current,
        Channel::Voltage,
        Channel::Temperature,
        Channel::Vibration,
        Channel::Pressure,
        Channel::Frequency,
    ];

    pub fn from_fk(token: &str) -> Option<Self> {
        match token.trim() {
            "1" => Some(Channel::Current),
            "2" => Some(Channel::Voltage),
            "3" => Some(Channel::Temperature),
            "4" => Some(Channel::Vibration),
            "5" => Some(Channel::Pressure),
            "6" => Some(Channel::Frequency),
            _ => None,
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug.trim() {
            "current" => Some(Channel::Current),
            "voltage" => Some(Channel::Voltage),
            "temperature" => Some(Channel::Temperature),
            "vibration" => Some(Channel::Vibration),
            "pressure" => Some(Channel::Pressure),
            "frequency" => Some(Channel::Frequency),
            _ => None,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Channel::Current => "current",
            Channel::Voltage => "voltage",
            Channel::Temperature => "temperature",
            Channel::Vibration => "vibration",
            Channel::Pressure => "pressure",
            Channel::Frequency => "frequency",
        }
    }

    fn table(self) -> &'static str {
        match self {
            Channel::Current => "sensor_current",
            Channel::Voltage => "sensor_voltage",
            Channel::Temperature => "sensor_temperature",
            Channel::Vibration => "sensor_vibration",
            Channel::Pressure => "sensor_pressure",
            Channel::Frequency => "sensor_frequency",
        }
    }
}

/// Local key-value record store, one table per channel, keyed by the raw
/// capture timestamp. Re-inserting a timestamp replaces the row, matching
/// the put-semantics of the cloud store this stands in for.
///
/// This is the storage collaborator boundary: the analytics engine only ever
/// sees the `Vec<Reading>` snapshot a scan returns.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open record store at {}", path.display()))?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory record store")?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        for channel in Channel::ALL {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        ts_key TEXT PRIMARY KEY,
                        value REAL NOT NULL,
                        fields TEXT NOT NULL DEFAULT '{{}}'
                    )",
                    channel.table()
                ),
                [],
            )
            .with_context(|| format!("failed to create table for channel {}", channel.slug()))?;
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("record store mutex poisoned"))
    }

    pub fn put(&self, channel: Channel, reading: &Reading) -> Result<()> {
        let conn = self.conn()?;
        insert_reading(&conn, channel, reading)
    }

    /// Inserts a batch inside one transaction; returns the number of rows
    /// written (replacements included).
    pub fn put_batch(&self, rows: &[(Channel, Reading)]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        for (channel, reading) in rows {
            insert_reading(&tx, *channel, reading)?;
        }
        tx.commit().context("failed to commit ingest batch")?;
        Ok(rows.len())
    }

    /// Returns every stored reading for a channel, in storage order. No
    /// ordering guarantee: callers sort by normalized timestamp themselves.
    pub fn scan(&self, channel: Channel) -> Result<Vec<Reading>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT ts_key, value, fields FROM {}",
                channel.table()
            ))
            .context("failed to prepare scan")?;
        let rows = stmt
            .query_map([], |row| {
                let ts_key: String = row.get(0)?;
                let value: f64 = row.get(1)?;
                let fields: String = row.get(2)?;
                Ok((ts_key, value, fields))
            })
            .context("failed to scan channel")?;

        let mut readings = Vec::new();
        for row in rows {
            let (ts_key, value, fields) = row.context("failed to read scanned row")?;
            let mut reading = Reading::new(value, decode_ts_key(&ts_key));
            if let Ok(JsonValue::Object(map)) = serde_json::from_str(&fields) {
                reading.fields = map;
            }
            readings.push(reading);
        }
        Ok(readings)
    }

    pub fn count(&self, channel: Channel) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", channel.table()),
            [],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to count channel {}", channel.slug()))
    }
}

fn insert_reading(conn: &Connection, channel: Channel, reading: &Reading) -> Result<()> {
    let fields = serde_json::to_string(&reading.fields).context("failed to encode fields")?;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {} (ts_key, value, fields) VALUES (?1, ?2, ?3)",
            channel.table()
        ),
        params![encode_ts_key(&reading.timestamp), reading.value, fields],
    )
    .with_context(|| format!("failed to write reading to channel {}", channel.slug()))?;
    Ok(())
}

/// The key column stores the raw timestamp verbatim so numeric epochs and
/// date-time strings both round-trip through a scan.
fn encode_ts_key(raw: &JsonValue) -> String {
    match raw {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn decode_ts_key(key: &str) -> JsonValue {
    serde_json::from_str(key).unwrap_or_else(|_| JsonValue::String(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_and_scan_round_trip() {
        let store = RecordStore::open_in_memory().unwrap();
        let mut reading = Reading::new(12.5, json!("2025-06-01 10:00"));
        reading
            .fields
            .insert("state".to_string(), json!("Loaded"));
        store.put(Channel::Current, &reading).unwrap();

        let scanned = store.scan(Channel::Current).unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].value, 12.5);
        assert_eq!(scanned[0].timestamp, json!("2025-06-01 10:00"));
        assert_eq!(scanned[0].fields.get("state"), Some(&json!("Loaded")));
    }

    #[test]
    fn numeric_timestamps_round_trip_as_numbers() {
        let store = RecordStore::open_in_memory().unwrap();
        store
            .put(Channel::Pressure, &Reading::new(4.0, json!(1_750_000_000)))
            .unwrap();
        let scanned = store.scan(Channel::Pressure).unwrap();
        assert_eq!(scanned[0].timestamp, json!(1_750_000_000));
    }

    #[test]
    fn same_timestamp_replaces_the_row() {
        let store = RecordStore::open_in_memory().unwrap();
        store
            .put(Channel::Voltage, &Reading::new(220.0, json!("2025-06-01 10:00")))
            .unwrap();
        store
            .put(Channel::Voltage, &Reading::new(221.0, json!("2025-06-01 10:00")))
            .unwrap();
        let scanned = store.scan(Channel::Voltage).unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].value, 221.0);
    }

    #[test]
    fn channels_are_isolated_and_countable() {
        let store = RecordStore::open_in_memory().unwrap();
        let rows = vec![
            (Channel::Vibration, Reading::new(0.0, json!("2025-06-01 10:00"))),
            (Channel::Vibration, Reading::new(2.0, json!("2025-06-01 10:05"))),
            (Channel::Current, Reading::new(20.0, json!("2025-06-01 10:00"))),
        ];
        assert_eq!(store.put_batch(&rows).unwrap(), 3);
        assert_eq!(store.count(Channel::Vibration).unwrap(), 2);
        assert_eq!(store.count(Channel::Current).unwrap(), 1);
        assert_eq!(store.count(Channel::Frequency).unwrap(), 0);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/records.db");
        let store = RecordStore::open(&path).unwrap();
        store
            .put(Channel::Temperature, &Reading::new(30.0, json!(1_750_000_000)))
            .unwrap();
        assert_eq!(store.count(Channel::Temperature).unwrap(), 1);
    }
}
