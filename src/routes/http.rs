// GET handlers: version, topology, resources, drill-down

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::drilldown::drill_down;
use crate::error::FetchError;
use crate::models::EntitySummary;
use crate::version::{NAME, VERSION};

fn not_found(what: &str, id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("{what} {id} not found") })),
    )
        .into_response()
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/topology: latest topology; 404 until the first successful refresh.
pub(super) async fn topology_handler(State(state): State<AppState>) -> Response {
    match state.store.topology().await {
        Some(t) => Json(t.as_ref().clone()).into_response(),
        None => not_found("topology", "(not fetched yet)"),
    }
}

pub(super) async fn resources_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.snapshot().await)
}

pub(super) async fn resource_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get(&id).await {
        Some(entry) => Json(entry).into_response(),
        None => not_found("resource", &id),
    }
}

pub(super) async fn summary_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get(&id).await {
        Some(entry) => Json(EntitySummary::from_sensors(&entry.id, &entry.sensors)).into_response(),
        None => not_found("resource", &id),
    }
}

pub(super) async fn sparkline_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.sparkline(&id).await {
        Some(series) => Json(series).into_response(),
        None => not_found("resource", &id),
    }
}

/// GET /api/applications/{app_id}/hosts/{host_id}/containers: live drill-down against upstream.
pub(super) async fn containers_handler(
    State(state): State<AppState>,
    Path((app_id, host_id)): Path<(String, String)>,
) -> Response {
    let cluster_type = &state.config.topology.cluster_type;
    match drill_down(&state.api, &app_id, &host_id, cluster_type).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            let status = match &e {
                FetchError::NotFound { .. } => StatusCode::NOT_FOUND,
                FetchError::Status { status: 404, .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_GATEWAY,
            };
            tracing::info!(error = %e, host_id = %host_id, "container drill-down failed");
            (
                status,
                Json(serde_json::json!({
                    "error": e.to_string(),
                    "class": e.class(),
                })),
            )
                .into_response()
        }
    }
}
