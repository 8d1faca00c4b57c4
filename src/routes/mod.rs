// HTTP + WebSocket routes (read-only views over the store)

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::api_repo::ApiRepo;
use crate::config::AppConfig;
use crate::store::ViewModelStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<ViewModelStore>,
    pub(crate) api: Arc<ApiRepo>,
    pub(crate) config: AppConfig,
}

pub fn app(store: Arc<ViewModelStore>, api: Arc<ApiRepo>, config: AppConfig) -> Router {
    let state = AppState { store, api, config };
    Router::new()
        .route("/", get(|| async { "topowatch: live topology poller" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/topology", get(http::topology_handler)) // GET /api/topology
        .route("/api/resources", get(http::resources_handler)) // GET /api/resources
        .route("/api/resources/{id}", get(http::resource_handler))
        .route("/api/resources/{id}/summary", get(http::summary_handler))
        .route("/api/resources/{id}/sparkline", get(http::sparkline_handler))
        .route(
            "/api/applications/{app_id}/hosts/{host_id}/containers",
            get(http::containers_handler),
        )
        .route("/ws/resources", get(ws::ws_resources)) // WS /ws/resources
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
