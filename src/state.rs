use std::sync::Arc;

use crate::config::ServerConfig;
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<RecordStore>,
}
