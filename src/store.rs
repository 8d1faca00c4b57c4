// View model store: resource id → latest merged state. Owned explicitly and shared via Arc.

use crate::error::FetchError;
use crate::models::{
    SensorReading, SparklineSeries, StaleMarker, StoreChange, StoreEvent, ViewEntry, now_secs,
};
use crate::topology::Topology;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Ids added to / removed from the topology by a sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

struct Inner {
    topology: Option<Arc<Topology>>,
    entries: HashMap<String, ViewEntry>,
}

pub struct ViewModelStore {
    inner: RwLock<Inner>,
    sparkline_capacity: usize,
    events: broadcast::Sender<StoreEvent>,
}

impl ViewModelStore {
    pub fn new(sparkline_capacity: usize, broadcast_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            inner: RwLock::new(Inner {
                topology: None,
                entries: HashMap::new(),
            }),
            sparkline_capacity,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn sparkline_capacity(&self) -> usize {
        self.sparkline_capacity
    }

    /// Installs a new topology and prunes entries whose id it no longer contains.
    pub async fn sync_topology(&self, topology: Topology) -> TopologyDiff {
        let topology = Arc::new(topology);
        let mut inner = self.inner.write().await;

        let added: Vec<String> = topology
            .resources
            .iter()
            .filter(|r| {
                inner
                    .topology
                    .as_ref()
                    .is_none_or(|prev| !prev.contains(&r.id))
            })
            .map(|r| r.id.clone())
            .collect();
        let removed: Vec<String> = match &inner.topology {
            Some(prev) => prev
                .resources
                .iter()
                .filter(|r| !topology.contains(&r.id))
                .map(|r| r.id.clone())
                .collect(),
            None => Vec::new(),
        };

        let mut pruned = Vec::new();
        inner.entries.retain(|id, _| {
            let keep = topology.contains(id);
            if !keep {
                pruned.push(id.clone());
            }
            keep
        });
        // Kind, owner and parent may change between refreshes for the same id.
        for entry in inner.entries.values_mut() {
            if let Some(r) = topology.get(&entry.id) {
                entry.kind = r.kind;
                entry.application_id.clone_from(&r.application_id);
                entry.parent.clone_from(&r.parent);
            }
        }
        inner.topology = Some(topology);
        drop(inner);

        for id in pruned {
            self.emit(id, StoreChange::Removed);
        }
        TopologyDiff { added, removed }
    }

    pub async fn topology(&self) -> Option<Arc<Topology>> {
        self.inner.read().await.topology.clone()
    }

    /// Replaces the entry's sensor map; id, config and sparkline are retained.
    /// Returns false (and drops the write) when `id` is not in the current topology.
    pub async fn apply_sensors(&self, id: &str, sensors: SensorReading) -> bool {
        let applied = self
            .update(id, |entry| {
                entry.sensors = sensors;
                entry.stale = None;
                entry.updated_at = Some(now_secs());
            })
            .await;
        if applied {
            self.emit(id.to_string(), StoreChange::Sensors);
        }
        applied
    }

    pub async fn apply_config(&self, id: &str, config: SensorReading) -> bool {
        let applied = self
            .update(id, |entry| {
                entry.config = Some(config);
                entry.updated_at = Some(now_secs());
            })
            .await;
        if applied {
            self.emit(id.to_string(), StoreChange::Config);
        }
        applied
    }

    pub async fn record_sample(&self, id: &str, timestamp: i64, value: f64) -> bool {
        let applied = self
            .update(id, |entry| {
                entry.sparkline.push(timestamp, value);
            })
            .await;
        if applied {
            self.emit(id.to_string(), StoreChange::Sample);
        }
        applied
    }

    /// Marks the entry stale, creating it when the resource has not been fetched yet.
    /// The first failure's time is kept until a success clears it.
    pub async fn mark_stale(&self, id: &str, err: &FetchError) -> bool {
        let marked = self
            .update(id, |entry| match &mut entry.stale {
                Some(marker) => {
                    marker.class = err.class();
                    marker.reason = err.to_string();
                }
                None => entry.stale = Some(StaleMarker::from_error(now_secs(), err)),
            })
            .await;
        if marked {
            self.emit(id.to_string(), StoreChange::Stale);
        }
        marked
    }

    pub async fn get(&self, id: &str) -> Option<ViewEntry> {
        self.inner.read().await.entries.get(id).cloned()
    }

    pub async fn sparkline(&self, id: &str) -> Option<SparklineSeries> {
        self.inner
            .read()
            .await
            .entries
            .get(id)
            .map(|e| e.sparkline.clone())
    }

    /// All entries in topology discovery order.
    pub async fn snapshot(&self) -> Vec<ViewEntry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<ViewEntry> = inner.entries.values().cloned().collect();
        if let Some(topology) = &inner.topology {
            entries.sort_by_key(|e| topology.position(&e.id).unwrap_or(usize::MAX));
        }
        entries
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Runs `f` on the entry for `id`, creating it on first write. No-op for ids outside the topology.
    async fn update(&self, id: &str, f: impl FnOnce(&mut ViewEntry)) -> bool {
        let mut inner = self.inner.write().await;
        let Inner { topology, entries } = &mut *inner;
        let Some(resource) = topology.as_ref().and_then(|t| t.get(id)) else {
            tracing::debug!(resource_id = id, "write for resource outside topology dropped");
            return false;
        };
        let entry = entries
            .entry(id.to_string())
            .or_insert_with(|| ViewEntry::new(resource, self.sparkline_capacity));
        f(entry);
        true
    }

    fn emit(&self, id: String, change: StoreChange) {
        // No receivers is normal when no WebSocket client is connected.
        let _ = self.events.send(StoreEvent {
            id,
            change,
            at: now_secs(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, ResourceKind};
    use serde_json::json;

    fn resource(id: &str, kind: ResourceKind, parent: Option<&str>) -> Resource {
        Resource {
            id: id.into(),
            name: id.into(),
            kind,
            application_id: "app".into(),
            parent: parent.map(Into::into),
            children: vec![],
        }
    }

    fn topology(ids: &[&str]) -> Topology {
        let mut resources = vec![resource("infra", ResourceKind::Infrastructure, None)];
        resources.extend(
            ids.iter()
                .map(|id| resource(id, ResourceKind::Host, Some("infra"))),
        );
        Topology::new(1, resources)
    }

    fn reading(v: serde_json::Value) -> SensorReading {
        serde_json::from_value(v).unwrap()
    }

    #[tokio::test]
    async fn sensor_write_preserves_id_and_retained_fields() {
        let store = ViewModelStore::new(10, 16);
        store.sync_topology(topology(&["h1"])).await;

        store
            .apply_config("h1", reading(json!({"docker.port": 2376})))
            .await;
        store.record_sample("h1", 5, 12.5).await;
        store
            .apply_sensors("h1", reading(json!({"machine.cpu": 0.1, "service.isUp": true})))
            .await;
        store
            .apply_sensors("h1", reading(json!({"machine.cpu": 0.4})))
            .await;

        let entry = store.get("h1").await.unwrap();
        assert_eq!(entry.id, "h1");
        assert_eq!(entry.kind, ResourceKind::Host);
        assert_eq!(entry.parent.as_deref(), Some("infra"));
        assert_eq!(entry.sensors.number("machine.cpu"), Some(0.4));
        assert!(entry.sensors.get("service.isUp").is_none());
        assert_eq!(
            entry.config.unwrap().get("docker.port"),
            Some(&json!(2376))
        );
        assert_eq!(entry.sparkline.points(), vec![(5, 12.5)]);
    }

    #[tokio::test]
    async fn writes_outside_topology_are_dropped() {
        let store = ViewModelStore::new(10, 16);
        assert!(!store.apply_sensors("h1", SensorReading::new()).await);

        store.sync_topology(topology(&["h1"])).await;
        assert!(!store.apply_sensors("ghost", SensorReading::new()).await);
        assert!(store.apply_sensors("h1", SensorReading::new()).await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn topology_refresh_prunes_removed_entries() {
        let store = ViewModelStore::new(10, 16);
        let mut events = store.subscribe();
        let diff = store.sync_topology(topology(&["h1", "h2"])).await;
        assert_eq!(diff.added, vec!["infra", "h1", "h2"]);
        assert!(diff.removed.is_empty());

        store.apply_sensors("h1", SensorReading::new()).await;
        store.apply_sensors("h2", SensorReading::new()).await;

        let diff = store.sync_topology(topology(&["h2", "h3"])).await;
        assert_eq!(diff.added, vec!["h3"]);
        assert_eq!(diff.removed, vec!["h1"]);
        assert!(store.get("h1").await.is_none());
        assert!(store.get("h2").await.is_some());
        // A poll for h1 that was in flight during the refresh lands after it.
        assert!(!store.apply_sensors("h1", SensorReading::new()).await);

        let mut changes = Vec::new();
        while let Ok(ev) = events.try_recv() {
            changes.push((ev.id, ev.change));
        }
        assert!(changes.contains(&("h1".to_string(), StoreChange::Removed)));
    }

    #[tokio::test]
    async fn refresh_updates_kind_and_owner_of_surviving_entries() {
        let store = ViewModelStore::new(10, 16);
        store.sync_topology(topology(&["x"])).await;
        store.record_sample("x", 1, 2.0).await;

        let mut moved = resource("x", ResourceKind::Container, Some("h9"));
        moved.application_id = "app2".into();
        let refreshed = Topology::new(2, vec![resource("h9", ResourceKind::Host, None), moved]);
        store.sync_topology(refreshed).await;

        let entry = store.get("x").await.unwrap();
        assert_eq!(entry.kind, ResourceKind::Container);
        assert_eq!(entry.application_id, "app2");
        assert_eq!(entry.parent.as_deref(), Some("h9"));
        assert_eq!(entry.sparkline.points(), vec![(1, 2.0)]);
    }

    #[tokio::test]
    async fn stale_marker_keeps_first_failure_time_until_success() {
        let store = ViewModelStore::new(10, 16);
        store.sync_topology(topology(&["h1"])).await;
        let err = FetchError::Timeout { url: "u".into() };

        assert!(!store.mark_stale("ghost", &err).await);
        assert!(store.mark_stale("h1", &err).await);
        let first = store.get("h1").await.unwrap().stale.unwrap();
        assert_eq!(first.class, crate::error::ErrorClass::Retryable);

        let err2 = FetchError::Status {
            url: "u".into(),
            status: 404,
        };
        store.mark_stale("h1", &err2).await;
        let second = store.get("h1").await.unwrap().stale.unwrap();
        assert_eq!(second.since, first.since);
        assert_eq!(second.class, crate::error::ErrorClass::Structural);

        store.apply_sensors("h1", SensorReading::new()).await;
        assert!(store.get("h1").await.unwrap().stale.is_none());
    }

    #[tokio::test]
    async fn snapshot_follows_discovery_order() {
        let store = ViewModelStore::new(10, 16);
        store.sync_topology(topology(&["h3", "h1", "h2"])).await;
        for id in ["h2", "h1", "h3"] {
            store.apply_sensors(id, SensorReading::new()).await;
        }
        let ids: Vec<String> = store.snapshot().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["h3", "h1", "h2"]);
    }

    #[tokio::test]
    async fn sparkline_is_capped_by_store_capacity() {
        let store = ViewModelStore::new(3, 16);
        store.sync_topology(topology(&["h1"])).await;
        for t in 1..=4 {
            store.record_sample("h1", t, 1.0).await;
        }
        let series = store.sparkline("h1").await.unwrap();
        assert_eq!(series.points(), vec![(2, 1.0), (3, 1.0), (4, 1.0)]);
    }
}
