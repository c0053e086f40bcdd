use chrono::{NaiveDate, TimeZone, Utc};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Default inter-reading gap treated as a stop/restart of the monitored
/// machine, minutes.
pub const DEFAULT_RESTART_GAP_MINUTES: f64 = 20.0;

/// The most recent restart detected in a batch: the later endpoint of the
/// last inter-reading gap exceeding the threshold, plus the gap size.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct RestartEvent {
    pub at_ms: i64,
    pub gap_minutes: f64,
}

/// Scans consecutive pairs and keeps the *last* gap above
/// `threshold_minutes`. `None` means no gap crossed the threshold, which is a
/// legitimate outcome, not an error.
pub fn last_restart(samples: &[(i64, f64)], threshold_minutes: f64) -> Option<RestartEvent> {
    let threshold_ms = threshold_minutes * 60_000.0;
    samples
        .windows(2)
        .filter(|w| (w[1].0 - w[0].0) as f64 > threshold_ms)
        .map(|w| RestartEvent {
            at_ms: w[1].0,
            gap_minutes: (w[1].0 - w[0].0) as f64 / 60_000.0,
        })
        .last()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct RunTotals {
    pub operating_ms: i64,
    pub stopped_ms: i64,
}

/// Splits the observed timeline into operating and stopped time. An
/// inter-reading span counts as operating when either endpoint vibrated
/// (non-zero value).
pub fn run_totals(samples: &[(i64, f64)]) -> RunTotals {
    samples.windows(2).fold(RunTotals::default(), |mut acc, w| {
        let gap = (w[1].0 - w[0].0).max(0);
        if w[0].1 != 0.0 || w[1].1 != 0.0 {
            acc.operating_ms += gap;
        } else {
            acc.stopped_ms += gap;
        }
        acc
    })
}

/// Edge-triggered duty-cycle counter: a 0 → positive transition arms a
/// cycle, the next return to 0 completes it. A cycle still armed at the end
/// of the sequence is not counted.
pub fn completed_cycles(samples: &[(i64, f64)]) -> u64 {
    let mut armed = false;
    let mut count = 0;
    for w in samples.windows(2) {
        let (prev, curr) = (w[0].1, w[1].1);
        if prev == 0.0 && curr > 0.0 {
            armed = true;
        } else if armed && prev != 0.0 && curr == 0.0 {
            count += 1;
            armed = false;
        }
    }
    count
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct DailyStats {
    pub mean: f64,
    pub peak: f64,
    pub samples: usize,
}

/// Mean and maximum over the readings that fall on `day` (UTC). `None` when
/// the batch has no same-day readings.
pub fn daily_stats(samples: &[(i64, f64)], day: NaiveDate) -> Option<DailyStats> {
    let todays: Vec<f64> = samples
        .iter()
        .filter(|(ts, _)| {
            Utc.timestamp_millis_opt(*ts)
                .single()
                .is_some_and(|dt| dt.date_naive() == day)
        })
        .map(|(_, value)| *value)
        .collect();
    if todays.is_empty() {
        return None;
    }
    let peak = todays.iter().copied().fold(f64::MIN, f64::max);
    Some(DailyStats {
        mean: todays.iter().sum::<f64>() / todays.len() as f64,
        peak,
        samples: todays.len(),
    })
}

/// Sample standard deviation (n−1 denominator); 0 for fewer than two values.
pub fn dispersion(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct PeakSample {
    pub value: f64,
    pub at_ms: i64,
}

/// The reading with the maximum value, with its canonical timestamp.
pub fn peak(samples: &[(i64, f64)]) -> Option<PeakSample> {
    samples
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|&(ts, value)| PeakSample { value, at_ms: ts })
}
