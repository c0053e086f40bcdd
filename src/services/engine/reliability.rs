use serde::Serialize;

use crate::services::engine::classify::{classify, is_overload, OperationalState, Thresholds};
use crate::services::engine::episodes::{effective_gaps, Episode, ServiceClass};

/// Whole-batch reliability aggregate for the current channel. Recomputed from
/// scratch on every query; every field has an explicit zero-denominator
/// fallback, so the summary is total over any input including the empty one.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct ReliabilitySummary {
    /// Mean Up-episode duration, milliseconds.
    pub mtbf_ms: f64,
    /// Mean Down-episode duration, milliseconds.
    pub mttr_ms: f64,
    /// `100 · Up / (Up + Down)`; 100 when nothing was observed.
    pub availability_pct: f64,
    pub off_pct: f64,
    pub idle_pct: f64,
    pub loaded_pct: f64,
    pub overload_events: u64,
    /// Mean reading value while classified Loaded.
    pub mean_loaded_value: f64,
    pub sample_count: u64,
}

fn mean_duration(episodes: &[Episode], class: ServiceClass) -> f64 {
    let durations: Vec<i64> = episodes
        .iter()
        .filter(|e| e.class == class)
        .map(|e| e.duration_ms)
        .collect();
    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    }
}

/// Computes the reliability summary from the segmented episodes plus the
/// time-sorted samples they were built from. The per-state percentages use
/// the same effective-gap policy as segmentation, so the three shares always
/// sum to 100 for a non-degenerate batch.
pub fn summarize(
    episodes: &[Episode],
    samples: &[(i64, f64)],
    thresholds: &Thresholds,
) -> ReliabilitySummary {
    let up_total: i64 = episodes
        .iter()
        .filter(|e| e.class == ServiceClass::Up)
        .map(|e| e.duration_ms)
        .sum();
    let down_total: i64 = episodes
        .iter()
        .filter(|e| e.class == ServiceClass::Down)
        .map(|e| e.duration_ms)
        .sum();

    let availability_pct = if up_total + down_total == 0 {
        // No observed uptime or downtime: vacuously fully available.
        100.0
    } else {
        100.0 * up_total as f64 / (up_total + down_total) as f64
    };

    // Each inter-reading gap is attributed to the state held at its start.
    let mut state_totals = [0_i64; 3];
    for (window, gap) in samples.windows(2).zip(effective_gaps(samples)) {
        let state = classify(window[0].1, thresholds);
        state_totals[state as usize] += gap;
    }
    let grand_total: i64 = state_totals.iter().sum();
    let state_pct = |state: OperationalState| {
        if grand_total == 0 {
            0.0
        } else {
            100.0 * state_totals[state as usize] as f64 / grand_total as f64
        }
    };

    let overload_events = samples
        .iter()
        .filter(|(_, value)| is_overload(*value, thresholds))
        .count() as u64;

    let loaded_values: Vec<f64> = samples
        .iter()
        .map(|(_, value)| *value)
        .filter(|value| classify(*value, thresholds) == OperationalState::Loaded)
        .collect();
    let mean_loaded_value = if loaded_values.is_empty() {
        0.0
    } else {
        loaded_values.iter().sum::<f64>() / loaded_values.len() as f64
    };

    ReliabilitySummary {
        mtbf_ms: mean_duration(episodes, ServiceClass::Up),
        mttr_ms: mean_duration(episodes, ServiceClass::Down),
        availability_pct,
        off_pct: state_pct(OperationalState::Off),
        idle_pct: state_pct(OperationalState::Idle),
        loaded_pct: state_pct(OperationalState::Loaded),
        overload_events,
        mean_loaded_value,
        sample_count: samples.len() as u64,
    }
}
