use std::sync::Arc;

use crate::config::ServerConfig;
use crate::services::engine::classify::Thresholds;
use crate::services::engine::vibration::DEFAULT_RESTART_GAP_MINUTES;
use crate::state::AppState;
use crate::store::RecordStore;

/// Test config with defaults. The store under test is always in-memory, so
/// the data root is a scratch path that is never created on disk.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        data_root: std::env::temp_dir().join("sensor-server-rs-test-data"),
        static_root: None,
        thresholds: Thresholds::default(),
        restart_gap_minutes: DEFAULT_RESTART_GAP_MINUTES,
        trend_target: 40.0,
        trend_sample_limit: 300,
    }
}

pub fn test_state() -> AppState {
    AppState {
        config: test_config(),
        store: Arc::new(RecordStore::open_in_memory().expect("in-memory store")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_leaves_nothing_on_disk() {
        let config = test_config();
        assert!(!config.data_root.exists());
        assert!(!config.store_path().exists());
    }
}
