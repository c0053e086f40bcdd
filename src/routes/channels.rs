use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{internal_error, AppError};
use crate::services::engine::episodes::segment;
use crate::services::engine::reliability::{self, ReliabilitySummary};
use crate::services::engine::trend::{self, TrendForecast};
use crate::services::engine::vibration::{self, DailyStats, PeakSample, RestartEvent};
use crate::services::engine::sorted_samples;
use crate::state::AppState;
use crate::store::Channel;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ChannelInfo {
    pub channel: Channel,
    pub records: i64,
}

#[utoipa::path(
    get,
    path = "/api/channels",
    tag = "channels",
    responses((status = 200, description = "Channel catalog with record counts", body = [ChannelInfo]))
)]
pub(crate) async fn channels_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChannelInfo>>, AppError> {
    let store = state.store.clone();
    let counts = tokio::task::spawn_blocking(move || {
        Channel::ALL
            .into_iter()
            .map(|channel| store.count(channel).map(|records| ChannelInfo { channel, records }))
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await
    .map_err(internal_error)?
    .map_err(internal_error)?;
    Ok(Json(counts))
}

#[utoipa::path(
    get,
    path = "/api/channels/current/reliability",
    tag = "channels",
    responses((status = 200, description = "MTBF/MTTR/availability aggregate", body = ReliabilitySummary))
)]
pub(crate) async fn reliability_handler(
    State(state): State<AppState>,
) -> Result<Json<ReliabilitySummary>, AppError> {
    let readings = super::scan_channel(&state, Channel::Current).await?;
    let samples = sorted_samples(&readings);
    let episodes = segment(&samples, &state.config.thresholds);
    Ok(Json(reliability::summarize(
        &episodes,
        &samples,
        &state.config.thresholds,
    )))
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct VibrationSummary {
    pub samples: usize,
    pub last_restart: Option<RestartEvent>,
    pub operating_ms: i64,
    pub stopped_ms: i64,
    pub completed_cycles: u64,
    /// Stats for the current UTC day; absent when nothing was read today.
    pub today: Option<DailyStats>,
    pub stdev: f64,
    pub peak: Option<PeakSample>,
}

#[utoipa::path(
    get,
    path = "/api/channels/vibration/summary",
    tag = "channels",
    responses((status = 200, description = "Vibration analytics over the stored batch", body = VibrationSummary))
)]
pub(crate) async fn vibration_handler(
    State(state): State<AppState>,
) -> Result<Json<VibrationSummary>, AppError> {
    let readings = super::scan_channel(&state, Channel::Vibration).await?;
    let samples = sorted_samples(&readings);
    let totals = vibration::run_totals(&samples);
    let values: Vec<f64> = samples.iter().map(|(_, value)| *value).collect();

    Ok(Json(VibrationSummary {
        samples: samples.len(),
        last_restart: vibration::last_restart(&samples, state.config.restart_gap_minutes),
        operating_ms: totals.operating_ms,
        stopped_ms: totals.stopped_ms,
        completed_cycles: vibration::completed_cycles(&samples),
        today: vibration::daily_stats(&samples, Utc::now().date_naive()),
        stdev: vibration::dispersion(&values),
        peak: vibration::peak(&samples),
    }))
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct TrendParams {
    /// Cap on how many of the oldest samples feed the fit.
    pub limit: Option<usize>,
    pub target: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/channels/frequency/trend",
    tag = "channels",
    params(
        ("limit" = Option<usize>, Query, description = "Sample cap for the fit"),
        ("target" = Option<f64>, Query, description = "Target value to project a crossing for")
    ),
    responses(
        (status = 200, description = "Linear trend fit with projected crossing", body = TrendForecast),
        (status = 404, description = "Not enough samples to fit")
    )
)]
pub(crate) async fn trend_handler(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> Result<Json<TrendForecast>, AppError> {
    let readings = super::scan_channel(&state, Channel::Frequency).await?;
    let mut samples = sorted_samples(&readings);
    let limit = params.limit.unwrap_or(state.config.trend_sample_limit);
    samples.truncate(limit);
    let target = params.target.unwrap_or(state.config.trend_target);

    trend::forecast(&samples, target)
        .map(Json)
        .ok_or_else(|| AppError::not_found("not enough frequency samples to fit a trend"))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels", get(channels_handler))
        .route("/channels/current/reliability", get(reliability_handler))
        .route("/channels/vibration/summary", get(vibration_handler))
        .route("/channels/frequency/trend", get(trend_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value as JsonValue};
    use tower::ServiceExt;

    use crate::services::engine::Reading;
    use crate::test_support::test_state;

    async fn body_json(response: axum::response::Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, JsonValue) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_json(response).await)
    }

    #[tokio::test]
    async fn catalog_lists_all_six_channels_with_counts() {
        let state = test_state();
        state
            .store
            .put(Channel::Pressure, &Reading::new(4.0, json!("2025-06-01 10:00")))
            .unwrap();
        let app = router().with_state(state);

        let (status, parsed) = get_json(app, "/channels").await;
        assert_eq!(status, StatusCode::OK);
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 6);
        let pressure = entries
            .iter()
            .find(|e| e["channel"] == json!("pressure"))
            .unwrap();
        assert_eq!(pressure["records"], json!(1));
    }

    #[tokio::test]
    async fn reliability_summary_over_an_empty_store_is_vacuous() {
        let app = router().with_state(test_state());
        let (status, parsed) = get_json(app, "/channels/current/reliability").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parsed["availability_pct"], json!(100.0));
        assert_eq!(parsed["sample_count"], json!(0));
    }

    #[tokio::test]
    async fn reliability_summary_reflects_the_stored_batch() {
        let state = test_state();
        let rows = vec![
            (Channel::Current, Reading::new(20.0, json!("2025-06-01 10:00"))),
            (Channel::Current, Reading::new(0.1, json!("2025-06-01 10:10"))),
            (Channel::Current, Reading::new(15.0, json!("2025-06-01 10:15"))),
        ];
        state.store.put_batch(&rows).unwrap();
        let app = router().with_state(state);

        let (status, parsed) = get_json(app, "/channels/current/reliability").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parsed["sample_count"], json!(3));
        let availability = parsed["availability_pct"].as_f64().unwrap();
        assert!(availability > 0.0 && availability < 100.0);
    }

    #[tokio::test]
    async fn vibration_summary_counts_cycles_and_totals() {
        let state = test_state();
        let values = [0.0, 3.0, 0.0, 0.0, 5.0, 0.0];
        let rows: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                (
                    Channel::Vibration,
                    Reading::new(*v, json!(1_750_000_000_000_i64 + i as i64 * 60_000)),
                )
            })
            .collect();
        state.store.put_batch(&rows).unwrap();
        let app = router().with_state(state);

        let (status, parsed) = get_json(app, "/channels/vibration/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parsed["samples"], json!(6));
        assert_eq!(parsed["completed_cycles"], json!(2));
        assert_eq!(parsed["peak"]["value"], json!(5.0));
        assert_eq!(parsed["last_restart"], JsonValue::Null);
    }

    #[tokio::test]
    async fn trend_fits_the_frequency_channel() {
        let state = test_state();
        // value = 10 + 0.5 * minute
        let rows: Vec<_> = (0..10)
            .map(|m| {
                (
                    Channel::Frequency,
                    Reading::new(
                        10.0 + 0.5 * m as f64,
                        json!(1_750_000_000_000_i64 + m * 60_000),
                    ),
                )
            })
            .collect();
        state.store.put_batch(&rows).unwrap();
        let app = router().with_state(state);

        let (status, parsed) = get_json(app, "/channels/frequency/trend?target=40").await;
        assert_eq!(status, StatusCode::OK);
        assert!((parsed["slope_per_minute"].as_f64().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(
            parsed["predicted_at_ms"],
            json!(1_750_000_000_000_i64 + 60 * 60_000)
        );
    }

    #[tokio::test]
    async fn trend_with_no_samples_is_not_found() {
        let app = router().with_state(test_state());
        let (status, parsed) = get_json(app, "/channels/frequency/trend").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(parsed.get("error").is_some());
    }
}
