use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::services::engine::classify::Thresholds;
use crate::services::engine::vibration::DEFAULT_RESTART_GAP_MINUTES;

const DEFAULT_DATA_ROOT: &str = "./data";
const DEFAULT_TREND_TARGET: f64 = 40.0;
const DEFAULT_TREND_SAMPLE_LIMIT: usize = 300;

/// Server configuration, read from `SENSOR_*` environment variables with
/// CLI overrides applied by `main`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_root: PathBuf,
    pub static_root: Option<PathBuf>,
    pub thresholds: Thresholds,
    pub restart_gap_minutes: f64,
    /// Value at which the frequency trend forecast predicts a crossing.
    pub trend_target: f64,
    /// How many of the oldest samples feed the trend fit by default.
    pub trend_sample_limit: usize,
}

impl ServerConfig {
    pub fn from_env(static_root: Option<PathBuf>) -> Result<Self> {
        let data_root = env_string("SENSOR_DATA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));

        let thresholds = Thresholds {
            off_max: env_f64("SENSOR_OFF_MAX")?.unwrap_or(Thresholds::default().off_max),
            loaded_min: env_f64("SENSOR_LOADED_MIN")?.unwrap_or(Thresholds::default().loaded_min),
            overload_min: env_f64("SENSOR_OVERLOAD_MIN")?
                .unwrap_or(Thresholds::default().overload_min),
        };

        Ok(Self {
            data_root,
            static_root,
            thresholds,
            restart_gap_minutes: env_f64("SENSOR_RESTART_GAP_MINUTES")?
                .unwrap_or(DEFAULT_RESTART_GAP_MINUTES),
            trend_target: env_f64("SENSOR_TREND_TARGET")?.unwrap_or(DEFAULT_TREND_TARGET),
            trend_sample_limit: env_usize("SENSOR_TREND_SAMPLE_LIMIT")?
                .unwrap_or(DEFAULT_TREND_SAMPLE_LIMIT),
        })
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_root.join("records.db")
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_f64(name: &str) -> Result<Option<f64>> {
    env_string(name)
        .map(|value| {
            value
                .parse::<f64>()
                .with_context(|| format!("invalid float in {name}: {value}"))
        })
        .transpose()
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    env_string(name)
        .map(|value| {
            value
                .parse::<usize>()
                .with_context(|| format!("invalid integer in {name}: {value}"))
        })
        .transpose()
}
