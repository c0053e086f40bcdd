use serde::Serialize;

use crate::services::engine::classify::{classify, OperationalState, Thresholds};

/// Substitute duration when a batch has no usable inter-reading gap at all.
pub const FALLBACK_GAP_MS: i64 = 60_000;

/// Binary in-service classification an episode is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceClass {
    Up,
    Down,
}

impl ServiceClass {
    pub fn of(state: OperationalState) -> Self {
        match state {
            OperationalState::Loaded => ServiceClass::Up,
            OperationalState::Off | OperationalState::Idle => ServiceClass::Down,
        }
    }
}

/// A maximal run of consecutive readings sharing one service class.
///
/// `end_ms` is the timestamp at which the run hands over to its successor
/// (the last reading's timestamp for the final episode). `duration_ms`
/// accumulates effective inter-reading gaps, so it equals `end_ms - start_ms`
/// whenever the input was strictly time-ordered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub class: ServiceClass,
    pub start_ms: i64,
    pub end_ms: i64,
    pub duration_ms: i64,
}

/// Per-pair inter-reading durations with the degenerate-gap policy applied:
/// a non-positive gap (duplicate or out-of-order timestamp) is replaced by
/// the mean of the batch's positive gaps, or by [`FALLBACK_GAP_MS`] when the
/// batch has none.
pub(crate) fn effective_gaps(samples: &[(i64, f64)]) -> Vec<i64> {
    let raw: Vec<i64> = samples.windows(2).map(|w| w[1].0 - w[0].0).collect();
    let positive: Vec<i64> = raw.iter().copied().filter(|gap| *gap > 0).collect();
    let substitute = if positive.is_empty() {
        FALLBACK_GAP_MS
    } else {
        positive.iter().sum::<i64>() / positive.len() as i64
    };
    raw.into_iter()
        .map(|gap| if gap > 0 { gap } else { substitute })
        .collect()
}

struct SegmentAcc {
    episodes: Vec<Episode>,
    current: Episode,
}

impl SegmentAcc {
    fn step(mut self, class: ServiceClass, ts_ms: i64, gap_ms: i64) -> Self {
        self.current.duration_ms += gap_ms;
        self.current.end_ms = ts_ms;
        if class != self.current.class {
            self.episodes.push(self.current);
            self.current = Episode {
                class,
                start_ms: ts_ms,
                end_ms: ts_ms,
                duration_ms: 0,
            };
        }
        self
    }

    fn finish(mut self) -> Vec<Episode> {
        self.episodes.push(self.current);
        self.episodes
    }
}

/// Run-length-encodes a time-sorted `(epoch_ms, value)` sequence into
/// contiguous Up/Down episodes. A single reading yields one zero-duration
/// episode; an empty input yields no episodes. For sorted input the episode
/// durations partition the span between the first and last timestamp exactly.
pub fn segment(samples: &[(i64, f64)], thresholds: &Thresholds) -> Vec<Episode> {
    let Some(&(first_ts, first_value)) = samples.first() else {
        return Vec::new();
    };

    let gaps = effective_gaps(samples);
    let acc = SegmentAcc {
        episodes: Vec::new(),
        current: Episode {
            class: ServiceClass::of(classify(first_value, thresholds)),
            start_ms: first_ts,
            end_ms: first_ts,
            duration_ms: 0,
        },
    };

    samples[1..]
        .iter()
        .zip(gaps)
        .fold(acc, |acc, (&(ts, value), gap)| {
            acc.step(ServiceClass::of(classify(value, thresholds)), ts, gap)
        })
        .finish()
}
