// Per-resource sensor + config polling

use crate::api_repo::ApiRepo;
use crate::error::log_fetch_error;
use crate::models::Resource;
use crate::store::ViewModelStore;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;

/// Fetches sensors (and config, when enabled) for one resource and writes them to the store.
/// The two fetches run concurrently and land in disjoint fields of the entry.
pub async fn poll_once(
    api: &ApiRepo,
    store: &ViewModelStore,
    resource: &Resource,
    fetch_config: bool,
) {
    let app_id = resource.application_id.as_str();
    let id = resource.id.as_str();

    let sensors = api.sensors_current_state(app_id, id);
    let (sensors, config) = if fetch_config {
        let (s, c) = tokio::join!(sensors, api.config_current_state(app_id, id));
        (s, Some(c))
    } else {
        (sensors.await, None)
    };

    match sensors {
        Ok(reading) => {
            store.apply_sensors(id, reading).await;
        }
        Err(e) => {
            log_fetch_error("sensors_current_state", id, &e);
            store.mark_stale(id, &e).await;
        }
    }
    match config {
        Some(Ok(config)) => {
            store.apply_config(id, config).await;
        }
        Some(Err(e)) => {
            log_fetch_error("config_current_state", id, &e);
        }
        None => {}
    }
}

/// Polls `resource` every `interval_ms` until `cancel` fires. An in-flight poll is abandoned on cancel.
pub(super) async fn run(
    api: Arc<ApiRepo>,
    store: Arc<ViewModelStore>,
    resource: Resource,
    interval_ms: u64,
    fetch_config: bool,
    cancel: CancellationToken,
) {
    let mut tick = interval(Duration::from_millis(interval_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tracing::debug!(resource_id = %resource.id, kind = resource.kind.as_str(), "sensor poller started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = poll_once(&api, &store, &resource, fetch_config) => {}
                }
            }
        }
    }
    tracing::debug!(resource_id = %resource.id, "sensor poller stopped");
}
