use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::AppError;
use crate::services::engine::series::{self, QueryMode, SeriesError, SeriesRow};
use crate::state::AppState;

/// `[value, epoch_ms]` pair in the dashboard wire layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPoint(pub f64, pub i64);

#[derive(Debug, Clone, Serialize)]
pub struct TargetSeries {
    pub target: String,
    pub datapoints: Vec<DataPoint>,
    /// Widened rows with auxiliary fields; omitted when no field was widened.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Map<String, JsonValue>>,
}

/// One requested target: either the dashboard datasource shape
/// `{"target": "voltage"}` or a bare metric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    Object { target: String },
    Name(String),
}

impl TargetSpec {
    fn metric(&self) -> &str {
        match self {
            TargetSpec::Object { target } => target,
            TargetSpec::Name(name) => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub targets: Vec<TargetSpec>,
}

fn target_series(target: &str, rows: Vec<SeriesRow>) -> TargetSeries {
    let datapoints = rows.iter().map(|row| DataPoint(row.value, row.ts_ms)).collect();
    let wide: Vec<Map<String, JsonValue>> = rows
        .into_iter()
        .filter(|row| !row.extra.is_empty())
        .map(|row| {
            let mut object = row.extra;
            object.insert("value".to_string(), JsonValue::from(row.value));
            object.insert("ts_ms".to_string(), JsonValue::from(row.ts_ms));
            object
        })
        .collect();
    TargetSeries {
        target: target.to_string(),
        datapoints,
        rows: wide,
    }
}

#[utoipa::path(
    get,
    path = "/api/series/{metric}",
    tag = "series",
    params(("metric" = String, Path, description = "Metric identifier")),
    responses(
        (status = 200, description = "Series for the metric"),
        (status = 400, description = "Unknown metric"),
        (status = 404, description = "No readings matched")
    )
)]
pub(crate) async fn series_handler(
    State(state): State<AppState>,
    Path(metric): Path<String>,
) -> Result<Json<Vec<TargetSeries>>, AppError> {
    let mode = QueryMode::resolve(&metric)
        .ok_or_else(|| AppError::bad_request(format!("unknown metric '{metric}'")))?;
    let readings = super::scan_channel(&state, mode.channel()).await?;
    match series::run(&mode, &readings) {
        Ok(rows) => Ok(Json(vec![target_series(&metric, rows)])),
        Err(SeriesError::Empty) => Err(AppError::not_found(SeriesError::Empty.to_string())),
        Err(err @ SeriesError::InvalidMetric(_)) => Err(AppError::bad_request(err.to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/api/query",
    tag = "series",
    responses(
        (status = 200, description = "One series entry per requested target"),
        (status = 400, description = "A target named an unknown metric")
    )
)]
pub(crate) async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Vec<TargetSeries>>, AppError> {
    let mut out = Vec::with_capacity(request.targets.len());
    for spec in &request.targets {
        let target = spec.metric();
        let mode = QueryMode::resolve(target)
            .ok_or_else(|| AppError::bad_request(format!("unknown metric '{target}'")))?;
        let readings = super::scan_channel(&state, mode.channel()).await?;
        match series::run(&mode, &readings) {
            Ok(rows) => out.push(target_series(target, rows)),
            // Multi-target responses keep their shape: an empty series is an
            // entry with no datapoints, not a failed request.
            Err(SeriesError::Empty) => out.push(target_series(target, Vec::new())),
            Err(err @ SeriesError::InvalidMetric(_)) => {
                return Err(AppError::bad_request(err.to_string()))
            }
        }
    }
    Ok(Json(out))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/series/{metric}", get(series_handler))
        .route("/query", post(query_handler))
}
