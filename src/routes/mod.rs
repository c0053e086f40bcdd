pub mod channels;
pub mod health;
pub mod ingest;
pub mod series;

use axum::Router;

use crate::error::{internal_error, AppError};
use crate::services::engine::Reading;
use crate::state::AppState;
use crate::store::Channel;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(ingest::router())
                .merge(series::router())
                .merge(channels::router())
                .merge(crate::openapi::router()),
        )
        .with_state(state)
}

/// Scans one channel's stored readings off the async worker threads; the
/// returned snapshot is the immutable input every analysis runs on.
pub(crate) async fn scan_channel(
    state: &AppState,
    channel: Channel,
) -> Result<Vec<Reading>, AppError> {
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || store.scan(channel))
        .await
        .map_err(internal_error)?
        .map_err(internal_error)
}
