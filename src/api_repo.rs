// Upstream monitoring REST API via reqwest (read-only GETs)

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::{EntityDescriptor, SensorReading, TreeNode};
use crate::version::USER_AGENT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct ApiRepo {
    client: Client,
    base_url: String,
    requests_total: Arc<AtomicU64>,
}

impl ApiRepo {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            requests_total: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests issued so far (including failed ones).
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    #[instrument(skip(self), fields(repo = "api", operation = "applications_tree"))]
    pub async fn applications_tree(&self) -> Result<Vec<TreeNode>, FetchError> {
        self.get_json("/v1/applications/tree", &[]).await
    }

    #[instrument(skip(self), fields(repo = "api", operation = "sensors_current_state"))]
    pub async fn sensors_current_state(
        &self,
        app_id: &str,
        entity_id: &str,
    ) -> Result<SensorReading, FetchError> {
        let path = format!("/v1/applications/{app_id}/entities/{entity_id}/sensors/current-state");
        self.get_json(&path, &[]).await
    }

    #[instrument(skip(self), fields(repo = "api", operation = "config_current_state"))]
    pub async fn config_current_state(
        &self,
        app_id: &str,
        entity_id: &str,
    ) -> Result<SensorReading, FetchError> {
        let path = format!("/v1/applications/{app_id}/entities/{entity_id}/config/current-state");
        self.get_json(&path, &[]).await
    }

    /// Current value of `sensor` for every descendant of the application whose type matches `type_regex`.
    #[instrument(skip(self), fields(repo = "api", operation = "descendant_sensor"))]
    pub async fn descendant_sensor(
        &self,
        app_id: &str,
        sensor: &str,
        type_regex: &str,
    ) -> Result<Map<String, Value>, FetchError> {
        let path = format!("/v1/applications/{app_id}/descendants/sensor/{sensor}");
        self.get_json(&path, &[("typeRegex", type_regex)]).await
    }

    #[instrument(skip(self), fields(repo = "api", operation = "children"))]
    pub async fn children(
        &self,
        app_id: &str,
        entity_id: &str,
    ) -> Result<Vec<EntityDescriptor>, FetchError> {
        let path = format!("/v1/applications/{app_id}/entities/{entity_id}/children");
        self.get_json(&path, &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
            url,
            message: e.to_string(),
        })
    }
}
