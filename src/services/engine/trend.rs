use serde::Serialize;

/// Least-squares trend over a time-sorted sample batch, with the projected
/// instant at which the fitted line reaches a target value. Used for the
/// frequency channel, whose drift toward its alarm limit is roughly linear
/// between maintenance windows.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct TrendForecast {
    /// Fitted slope in value units per minute.
    pub slope_per_minute: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub target: f64,
    /// When the fitted line crosses `target`; `None` for a flat fit.
    pub predicted_at_ms: Option<i64>,
    pub samples: usize,
}

/// Fits `value ~ minutes since first reading` by ordinary least squares.
/// Returns `None` when fewer than two samples exist or all timestamps
/// coincide (no usable x-variance).
pub fn forecast(samples: &[(i64, f64)], target: f64) -> Option<TrendForecast> {
    if samples.len() < 2 {
        return None;
    }
    let t0 = samples[0].0;
    let xs: Vec<f64> = samples
        .iter()
        .map(|(ts, _)| (ts - t0) as f64 / 60_000.0)
        .collect();
    let ys: Vec<f64> = samples.iter().map(|(_, value)| *value).collect();

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(&ys)
        .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
        .sum();
    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    };

    let predicted_at_ms = if slope != 0.0 {
        let minutes = (target - intercept) / slope;
        if minutes.is_finite() {
            Some(t0 + (minutes.round() as i64) * 60_000)
        } else {
            None
        }
    } else {
        None
    };

    Some(TrendForecast {
        slope_per_minute: slope,
        intercept,
        r_squared,
        target,
        predicted_at_ms,
        samples: samples.len(),
    })
}
