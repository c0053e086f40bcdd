use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthz_handler,
        crate::routes::ingest::ingest_json,
        crate::routes::ingest::ingest_csv,
        crate::routes::series::series_handler,
        crate::routes::series::query_handler,
        crate::routes::channels::channels_handler,
        crate::routes::channels::reliability_handler,
        crate::routes::channels::vibration_handler,
        crate::routes::channels::trend_handler,
    ),
    components(schemas(
        crate::routes::health::HealthResponse,
        crate::routes::channels::ChannelInfo,
        crate::routes::channels::VibrationSummary,
        crate::services::ingest::IngestReport,
        crate::services::engine::reliability::ReliabilitySummary,
        crate::services::engine::vibration::RestartEvent,
        crate::services::engine::vibration::RunTotals,
        crate::services::engine::vibration::DailyStats,
        crate::services::engine::vibration::PeakSample,
        crate::services::engine::trend::TrendForecast,
        crate::store::Channel,
    )),
    tags(
        (name = "ingest", description = "Device payload ingestion"),
        (name = "series", description = "Dashboard series queries"),
        (name = "channels", description = "Per-channel analytics")
    )
)]
struct ApiDoc;

/// The assembled OpenAPI document for every served route.
pub fn document() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub(crate) async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(document())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_handler))
}
