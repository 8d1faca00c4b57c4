// Per-application sparkline sampling from the descendants sensor endpoint

use crate::api_repo::ApiRepo;
use crate::config::SparklineConfig;
use crate::error::{FetchError, log_fetch_error};
use crate::models::{now_secs, numeric};
use crate::store::ViewModelStore;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;

/// Samples `config.sensor` across the application's descendants and appends
/// `(now, value × scale)` to each matching resource's series. Returns the number of samples recorded.
/// Null or non-numeric values and ids outside the topology are skipped.
pub async fn sample_once(
    api: &ApiRepo,
    store: &ViewModelStore,
    app_id: &str,
    config: &SparklineConfig,
) -> Result<usize, FetchError> {
    let values = api
        .descendant_sensor(app_id, &config.sensor, &config.type_regex)
        .await?;
    let now = now_secs();
    let mut recorded = 0;
    for (id, value) in values {
        let Some(v) = numeric(&value) else {
            tracing::trace!(resource_id = %id, sensor = %config.sensor, "non-numeric sample skipped");
            continue;
        };
        if store.record_sample(&id, now, v * config.scale).await {
            recorded += 1;
        }
    }
    Ok(recorded)
}

pub(super) async fn run(
    api: Arc<ApiRepo>,
    store: Arc<ViewModelStore>,
    app_id: String,
    config: SparklineConfig,
    cancel: CancellationToken,
) {
    let mut tick = interval(Duration::from_millis(config.interval_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tracing::debug!(application_id = %app_id, sensor = %config.sensor, "sparkline sampler started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = sample_once(&api, &store, &app_id, &config) => {
                        if let Err(e) = result {
                            log_fetch_error("descendant_sensor", &app_id, &e);
                        }
                    }
                }
            }
        }
    }
    tracing::debug!(application_id = %app_id, "sparkline sampler stopped");
}
