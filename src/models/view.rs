// Per-resource view state held in the store

use serde::{Deserialize, Serialize};

use super::{Resource, ResourceKind, SensorReading, SparklineSeries};
use crate::error::{ErrorClass, FetchError};

/// Set on the first failed refresh after a success; cleared by the next success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleMarker {
    /// Unix seconds.
    pub since: i64,
    pub class: ErrorClass,
    pub reason: String,
}

impl StaleMarker {
    pub fn from_error(since: i64, err: &FetchError) -> Self {
        Self {
            since,
            class: err.class(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEntry {
    pub id: String,
    pub kind: ResourceKind,
    pub application_id: String,
    pub parent: Option<String>,
    pub sensors: SensorReading,
    pub config: Option<SensorReading>,
    pub sparkline: SparklineSeries,
    pub stale: Option<StaleMarker>,
    /// Unix seconds of the last successful write.
    pub updated_at: Option<i64>,
}

impl ViewEntry {
    pub fn new(resource: &Resource, sparkline_capacity: usize) -> Self {
        Self {
            id: resource.id.clone(),
            kind: resource.kind,
            application_id: resource.application_id.clone(),
            parent: resource.parent.clone(),
            sensors: SensorReading::new(),
            config: None,
            sparkline: SparklineSeries::new(sparkline_capacity),
            stale: None,
            updated_at: None,
        }
    }
}

/// What changed in the store; broadcast to WebSocket clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreChange {
    Sensors,
    Config,
    Sample,
    Stale,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEvent {
    pub id: String,
    pub change: StoreChange,
    /// Unix seconds.
    pub at: i64,
}
