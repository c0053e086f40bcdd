use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value as JsonValue;

use crate::error::{internal_error, AppError};
use crate::services::engine::Reading;
use crate::services::ingest::{self, IngestReport, RawRecord};
use crate::state::AppState;
use crate::store::Channel;

#[utoipa::path(
    post,
    path = "/api/ingest",
    tag = "ingest",
    responses(
        (status = 200, description = "Ingest result", body = IngestReport),
        (status = 400, description = "Malformed payload")
    )
)]
pub(crate) async fn ingest_json(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(body): Json<JsonValue>,
) -> Result<Json<IngestReport>, AppError> {
    let records =
        ingest::json_records(&body).map_err(|err| AppError::bad_request(err.to_string()))?;
    store_records(state, records).await
}

#[utoipa::path(
    post,
    path = "/api/ingest/csv",
    tag = "ingest",
    responses(
        (status = 200, description = "Ingest result", body = IngestReport),
        (status = 400, description = "Malformed payload")
    )
)]
pub(crate) async fn ingest_csv(
    axum::extract::State(state): axum::extract::State<AppState>,
    body: String,
) -> Result<Json<IngestReport>, AppError> {
    let records =
        ingest::csv_records(&body).map_err(|err| AppError::bad_request(err.to_string()))?;
    store_records(state, records).await
}

async fn store_records(
    state: AppState,
    records: Vec<RawRecord>,
) -> Result<Json<IngestReport>, AppError> {
    if records.is_empty() {
        return Err(AppError::bad_request("No records provided"));
    }

    let (rows, skipped) = ingest::coerce_batch(&records, &state.config.thresholds);
    let inserted = write_rows(&state, rows).await?;
    Ok(Json(IngestReport { inserted, skipped }))
}

async fn write_rows(state: &AppState, rows: Vec<(Channel, Reading)>) -> Result<usize, AppError> {
    if rows.is_empty() {
        return Ok(0);
    }
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || store.put_batch(&rows))
        .await
        .map_err(internal_error)?
        .map_err(internal_error)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingest", post(ingest_json))
        .route("/ingest/csv", post(ingest_csv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support::test_state;

    async fn body_json(response: axum::response::Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn json_ingest_routes_records_into_channel_tables() {
        let state = test_state();
        let app = router().with_state(state.clone());
        let payload = json!([
            {"fk_sensor": "1", "valor": 20.0, "data_captura": "01/06/2025 10:00"},
            {"fk_sensor": "1", "valor": 0.2, "data_captura": "01/06/2025 10:05"},
            {"fk_sensor": "9", "valor": 1.0, "data_captura": "01/06/2025 10:05"},
        ]);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ingest")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"inserted": 2, "skipped": 1}));
        assert_eq!(state.store.count(Channel::Current).unwrap(), 2);
    }

    #[tokio::test]
    async fn csv_ingest_accepts_the_device_export_layout() {
        let state = test_state();
        let app = router().with_state(state.clone());
        let body = "\u{feff}fk_sensor,valor,data_captura\n4,0.8,01/06/2025 10:00\n4,0.0,01/06/2025 10:05\n";

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ingest/csv")
                    .header(header::CONTENT_TYPE, "text/csv")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.count(Channel::Vibration).unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_payloads_are_rejected_with_the_error_envelope() {
        let app = router().with_state(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ingest")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("[]"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let parsed = body_json(response).await;
        assert!(parsed.get("error").is_some());
    }
}
