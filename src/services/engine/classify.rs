use serde::{Deserialize, Serialize};

pub const DEFAULT_OFF_MAX: f64 = 0.5;
pub const DEFAULT_LOADED_MIN: f64 = 10.0;
pub const DEFAULT_OVERLOAD_MIN: f64 = 50.0;

/// Classification thresholds for the current channel, in amperes.
/// Overridable through `SENSOR_*` environment variables (see `config`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub off_max: f64,
    pub loaded_min: f64,
    pub overload_min: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            off_max: DEFAULT_OFF_MAX,
            loaded_min: DEFAULT_LOADED_MIN,
            overload_min: DEFAULT_OVERLOAD_MIN,
        }
    }
}

/// Three-way operational state of the monitored machine, derived from one
/// current reading in isolation. Boundary values belong to the upper class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum OperationalState {
    Off,
    Idle,
    Loaded,
}

impl OperationalState {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationalState::Off => "Off",
            OperationalState::Idle => "Idle",
            OperationalState::Loaded => "Loaded",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            l if l.eq_ignore_ascii_case("off") => Some(OperationalState::Off),
            l if l.eq_ignore_ascii_case("idle") => Some(OperationalState::Idle),
            l if l.eq_ignore_ascii_case("loaded") => Some(OperationalState::Loaded),
            _ => None,
        }
    }

    /// Numeric level used when a categorical state has to be plotted as a
    /// series value.
    pub fn level(self) -> f64 {
        match self {
            OperationalState::Off => 0.0,
            OperationalState::Idle => 0.5,
            OperationalState::Loaded => 1.0,
        }
    }
}

/// `value < off_max → Off`, `value ≥ loaded_min → Loaded`, otherwise `Idle`.
/// Total over all finite inputs; history never matters.
pub fn classify(value: f64, thresholds: &Thresholds) -> OperationalState {
    if value < thresholds.off_max {
        OperationalState::Off
    } else if value >= thresholds.loaded_min {
        OperationalState::Loaded
    } else {
        OperationalState::Idle
    }
}

/// Overload is a separate flag, independent of the three-way state.
pub fn is_overload(value: f64, thresholds: &Thresholds) -> bool {
    value > thresholds.overload_min
}
