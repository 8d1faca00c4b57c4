// Shared test helpers: an in-process fake of the upstream REST API

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use topowatch::config::AppConfig;

pub const INFRA_TYPE: &str = "brooklyn.entity.container.docker.DockerInfrastructure";
pub const HOST_TYPE: &str = "brooklyn.entity.container.docker.DockerHost";
pub const CONTAINER_TYPE: &str = "brooklyn.entity.container.docker.DockerContainer";
pub const CLUSTER_TYPE: &str = "brooklyn.entity.group.DynamicCluster";

/// Canned upstream state. Entity ids not configured answer 404.
#[derive(Default)]
pub struct FakeApi {
    pub tree: Mutex<Value>,
    pub sensors: Mutex<HashMap<String, Value>>,
    pub config: Mutex<HashMap<String, Value>>,
    pub children: Mutex<HashMap<String, Value>>,
    /// Application id → (resource id → sample).
    pub descendants: Mutex<HashMap<String, Value>>,
    /// Entity ids whose sensor/config/children requests answer 500.
    pub failing: Mutex<HashSet<String>>,
    /// Request paths (with query) in arrival order.
    pub requests: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        *fake.tree.lock().unwrap() = json!([]);
        Arc::new(fake)
    }

    pub fn set_tree(&self, tree: Value) {
        *self.tree.lock().unwrap() = tree;
    }

    pub fn set_sensors(&self, id: &str, v: Value) {
        self.sensors.lock().unwrap().insert(id.into(), v);
    }

    pub fn set_config(&self, id: &str, v: Value) {
        self.config.lock().unwrap().insert(id.into(), v);
    }

    pub fn set_children(&self, id: &str, v: Value) {
        self.children.lock().unwrap().insert(id.into(), v);
    }

    pub fn set_descendants(&self, app_id: &str, v: Value) {
        self.descendants.lock().unwrap().insert(app_id.into(), v);
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.into());
    }

    pub fn recover(&self, id: &str) {
        self.failing.lock().unwrap().remove(id);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_matching(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.contains(needle))
            .count()
    }

    fn record(&self, uri: &Uri) {
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        self.requests.lock().unwrap().push(path);
    }

    fn entity_reply(&self, table: &Mutex<HashMap<String, Value>>, id: &str) -> Response {
        if self.failing.lock().unwrap().contains(id) {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        match table.lock().unwrap().get(id) {
            Some(v) => Json(v.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

async fn tree(State(fake): State<Arc<FakeApi>>, uri: Uri) -> Response {
    fake.record(&uri);
    let tree = fake.tree.lock().unwrap().clone();
    Json(tree).into_response()
}

async fn sensors(
    State(fake): State<Arc<FakeApi>>,
    Path((_app, id)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    fake.record(&uri);
    fake.entity_reply(&fake.sensors, &id)
}

async fn config(
    State(fake): State<Arc<FakeApi>>,
    Path((_app, id)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    fake.record(&uri);
    fake.entity_reply(&fake.config, &id)
}

async fn children(
    State(fake): State<Arc<FakeApi>>,
    Path((_app, id)): Path<(String, String)>,
    uri: Uri,
) -> Response {
    fake.record(&uri);
    fake.entity_reply(&fake.children, &id)
}

async fn descendants(
    State(fake): State<Arc<FakeApi>>,
    Path((app, _sensor)): Path<(String, String)>,
    Query(_query): Query<HashMap<String, String>>,
    uri: Uri,
) -> Response {
    fake.record(&uri);
    let v = fake
        .descendants
        .lock()
        .unwrap()
        .get(&app)
        .cloned()
        .unwrap_or_else(|| json!({}));
    Json(v).into_response()
}

/// Serves `fake` on an ephemeral localhost port; returns the base URL.
pub async fn start(fake: Arc<FakeApi>) -> String {
    let app = Router::new()
        .route("/v1/applications/tree", get(tree))
        .route(
            "/v1/applications/{app}/entities/{id}/sensors/current-state",
            get(sensors),
        )
        .route(
            "/v1/applications/{app}/entities/{id}/config/current-state",
            get(config),
        )
        .route("/v1/applications/{app}/entities/{id}/children", get(children))
        .route(
            "/v1/applications/{app}/descendants/sensor/{sensor}",
            get(descendants),
        )
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Config pointing at `base_url` with short intervals suitable for tests.
pub fn test_config(base_url: &str) -> AppConfig {
    let toml = format!(
        r#"
[server]
port = 8090
host = "127.0.0.1"

[api]
base_url = "{base_url}"
request_timeout_ms = 2000

[topology]
refresh_interval_ms = 40

[sensors]
interval_ms = 20

[sparkline]
interval_ms = 20
capacity = 5

[publishing]
broadcast_capacity = 256

[monitoring]
stats_log_interval_secs = 3600
"#
    );
    AppConfig::load_from_str(&toml).unwrap()
}

/// One application with a docker infrastructure holding `hosts`; each host has a cluster of `containers`.
pub fn docker_tree(app_id: &str, hosts: &[(&str, &[&str])]) -> Value {
    let hosts: Vec<Value> = hosts
        .iter()
        .map(|(host, containers)| {
            let containers: Vec<Value> = containers
                .iter()
                .map(|c| json!({"id": c, "name": c, "type": CONTAINER_TYPE, "children": []}))
                .collect();
            json!({
                "id": host, "name": host, "type": HOST_TYPE,
                "children": [
                    {"id": format!("{host}-cluster"), "type": CLUSTER_TYPE, "children": containers}
                ]
            })
        })
        .collect();
    json!([{
        "id": app_id,
        "name": app_id,
        "type": "brooklyn.entity.basic.BasicApplication",
        "children": [{
            "id": format!("{app_id}-infra"),
            "name": "docker",
            "type": INFRA_TYPE,
            "children": [{"id": format!("{app_id}-hosts"), "type": CLUSTER_TYPE, "children": hosts}]
        }]
    }])
}

/// Polls `check` until it returns true or 3 seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(3);
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    }
}
