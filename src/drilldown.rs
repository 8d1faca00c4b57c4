// Host → cluster → containers drill-down

use crate::api_repo::ApiRepo;
use crate::error::{FetchError, Lookup};
use crate::models::{EntityDescriptor, SensorReading};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::instrument;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDrillDown {
    pub host_id: String,
    pub cluster_id: String,
    /// Container id → current sensor state.
    pub containers: BTreeMap<String, SensorReading>,
    /// Containers whose sensor fetch failed, with the error text.
    pub failures: BTreeMap<String, String>,
}

/// Selects the children of `cluster_type`. The caller decides how to treat ambiguity.
pub fn find_cluster(
    children: Vec<EntityDescriptor>,
    cluster_type: &str,
) -> Lookup<EntityDescriptor> {
    Lookup::from_matches(children.into_iter().filter(|c| c.type_ == cluster_type))
}

/// Fetches the host's children, picks its cluster child (first one if several, error if none),
/// then fetches every container's sensors concurrently.
#[instrument(skip(repo), fields(operation = "drill_down"))]
pub async fn drill_down(
    repo: &ApiRepo,
    app_id: &str,
    host_id: &str,
    cluster_type: &str,
) -> Result<ContainerDrillDown, FetchError> {
    let children = repo.children(app_id, host_id).await?;
    let cluster = match find_cluster(children, cluster_type) {
        Lookup::Found(c) => c,
        Lookup::Ambiguous { first, count } => {
            tracing::warn!(
                host_id,
                cluster_id = %first.id,
                matches = count,
                "host has several cluster children; using the first"
            );
            first
        }
        Lookup::NotFound => {
            return Err(FetchError::NotFound {
                parent: host_id.to_string(),
                kind: cluster_type.to_string(),
            });
        }
    };

    let containers = repo.children(app_id, &cluster.id).await?;
    let results = join_all(containers.iter().map(|c| async move {
        (
            c.id.clone(),
            repo.sensors_current_state(app_id, &c.id).await,
        )
    }))
    .await;

    let mut out = ContainerDrillDown {
        host_id: host_id.to_string(),
        cluster_id: cluster.id,
        ..Default::default()
    };
    for (id, result) in results {
        match result {
            Ok(reading) => {
                out.containers.insert(id, reading);
            }
            Err(e) => {
                crate::error::log_fetch_error("drill_down_container", &id, &e);
                out.failures.insert(id, e.to_string());
            }
        }
    }
    Ok(out)
}
