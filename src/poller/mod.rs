// Background polling: topology refresh loop plus one subscription per resource / application.
// Subscriptions are reconciled against every successful topology refresh.

mod sensors;
mod sparkline;
mod subscription;

pub use sensors::poll_once;
pub use sparkline::sample_once;
pub use subscription::Subscription;

use crate::api_repo::ApiRepo;
use crate::config::{AppConfig, SparklineConfig};
use crate::error::log_fetch_error;
use crate::models::Resource;
use crate::store::ViewModelStore;
use crate::topology::{KindMatcher, Topology, fetch_topology};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Shared collaborators and the root cancellation token.
pub struct PollerDeps {
    pub api: Arc<ApiRepo>,
    pub store: Arc<ViewModelStore>,
    pub cancel: CancellationToken,
}

/// Poller timing and classification config.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub topology_refresh_interval_ms: u64,
    pub matcher: KindMatcher,
    pub sensors_interval_ms: u64,
    pub fetch_config: bool,
    pub sparkline: SparklineConfig,
    /// How often to log poller stats (real seconds).
    pub stats_log_interval_secs: u64,
}

impl From<&AppConfig> for PollerConfig {
    fn from(c: &AppConfig) -> Self {
        Self {
            topology_refresh_interval_ms: c.topology.refresh_interval_ms,
            matcher: KindMatcher::from(&c.topology),
            sensors_interval_ms: c.sensors.interval_ms,
            fetch_config: c.sensors.fetch_config,
            sparkline: c.sparkline.clone(),
            stats_log_interval_secs: c.monitoring.stats_log_interval_secs,
        }
    }
}

/// A sensor subscription and the resource it was started for.
struct SensorSub {
    resource: Resource,
    sub: Subscription,
}

impl SensorSub {
    /// Still running and polling the same kind of resource in the same application.
    fn serves(&self, resource: &Resource) -> bool {
        !self.sub.is_finished()
            && self.resource.kind == resource.kind
            && self.resource.application_id == resource.application_id
    }
}

/// Owns the live subscriptions, keyed by resource id (sensors) and application id (sparklines).
struct Supervisor {
    api: Arc<ApiRepo>,
    store: Arc<ViewModelStore>,
    cancel: CancellationToken,
    config: PollerConfig,
    sensor_subs: HashMap<String, SensorSub>,
    sparkline_subs: HashMap<String, Subscription>,
    refreshes_total: u64,
    refresh_failures_total: u64,
    restarts_total: u64,
}

impl Supervisor {
    async fn refresh(&mut self) {
        match fetch_topology(&self.api, &self.config.matcher).await {
            Ok(topology) => {
                self.refreshes_total += 1;
                self.apply(topology).await;
            }
            Err(e) => {
                // Previous topology and subscriptions stay in place.
                self.refresh_failures_total += 1;
                log_fetch_error("fetch_topology", "applications/tree", &e);
            }
        }
    }

    async fn apply(&mut self, topology: Topology) {
        let resources: Vec<Resource> = topology.resources.clone();
        let app_ids = topology.application_ids();
        let diff = self.store.sync_topology(topology).await;
        if !diff.added.is_empty() || !diff.removed.is_empty() {
            tracing::info!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                resources = resources.len(),
                "topology changed"
            );
        }

        let current: HashSet<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        let stale_ids: Vec<String> = self
            .sensor_subs
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale_ids {
            if let Some(entry) = self.sensor_subs.remove(&id) {
                entry.sub.cancel();
            }
        }
        for resource in resources {
            if let Some(existing) = self.sensor_subs.get(&resource.id) {
                if existing.serves(&resource) {
                    continue;
                }
                tracing::debug!(resource_id = %resource.id, "restarting sensor subscription");
                self.restarts_total += 1;
            }
            let id = resource.id.clone();
            let api = self.api.clone();
            let store = self.store.clone();
            let interval_ms = self.config.sensors_interval_ms;
            let fetch_config = self.config.fetch_config;
            let polled = resource.clone();
            let sub = Subscription::spawn(&self.cancel, move |token| {
                sensors::run(api, store, polled, interval_ms, fetch_config, token)
            });
            // Replacing an entry drops the old handle, which cancels its task.
            self.sensor_subs.insert(id, SensorSub { resource, sub });
        }

        self.sparkline_subs.retain(|app_id, _| app_ids.contains(app_id));
        for app_id in app_ids {
            if let Some(existing) = self.sparkline_subs.get(&app_id) {
                if !existing.is_finished() {
                    continue;
                }
                tracing::debug!(application_id = %app_id, "restarting sparkline subscription");
                self.restarts_total += 1;
            }
            let api = self.api.clone();
            let store = self.store.clone();
            let config = self.config.sparkline.clone();
            let id = app_id.clone();
            let sub = Subscription::spawn(&self.cancel, move |token| {
                sparkline::run(api, store, id, config, token)
            });
            self.sparkline_subs.insert(app_id, sub);
        }
    }

    async fn log_stats(&self) {
        let store_entries = self.store.len().await;
        tracing::info!(
            sensor_subscriptions = self.sensor_subs.len(),
            sparkline_subscriptions = self.sparkline_subs.len(),
            store_entries,
            refreshes_total = self.refreshes_total,
            refresh_failures_total = self.refresh_failures_total,
            restarts_total = self.restarts_total,
            upstream_requests_total = self.api.requests_total(),
            "poller stats"
        );
    }

    async fn shutdown(self) {
        let subs = self
            .sensor_subs
            .into_values()
            .map(|entry| entry.sub)
            .chain(self.sparkline_subs.into_values());
        futures_util::future::join_all(subs.map(Subscription::shutdown)).await;
    }
}

/// Spawns the topology refresh loop. Cancelling `deps.cancel` stops it and every subscription.
pub fn spawn(deps: PollerDeps, config: PollerConfig) -> tokio::task::JoinHandle<()> {
    let PollerDeps { api, store, cancel } = deps;
    let refresh_interval = Duration::from_millis(config.topology_refresh_interval_ms);
    let stats_log_interval = Duration::from_secs(config.stats_log_interval_secs);

    let poller_span = tracing::span!(
        tracing::Level::DEBUG,
        "poller",
        refresh_interval_ms = config.topology_refresh_interval_ms
    );

    tokio::spawn(
        async move {
            let mut refresh_tick = interval(refresh_interval);
            refresh_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut stats_log_tick = interval(stats_log_interval);
            stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Skip the immediate first stats tick.
            stats_log_tick.reset();

            let mut supervisor = Supervisor {
                api,
                store,
                cancel: cancel.clone(),
                config,
                sensor_subs: HashMap::new(),
                sparkline_subs: HashMap::new(),
                refreshes_total: 0,
                refresh_failures_total: 0,
                restarts_total: 0,
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Poller shutting down");
                        break;
                    }
                    _ = refresh_tick.tick() => {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = supervisor.refresh() => {}
                        }
                    }
                    _ = stats_log_tick.tick() => {
                        supervisor.log_stats().await;
                    }
                }
            }
            supervisor.shutdown().await;
        }
        .instrument(poller_span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, TopologyConfig};
    use crate::models::ResourceKind;

    fn resource(id: &str, kind: ResourceKind, app: &str) -> Resource {
        Resource {
            id: id.into(),
            name: id.into(),
            kind,
            application_id: app.into(),
            parent: None,
            children: vec![],
        }
    }

    fn supervisor() -> Supervisor {
        let api = ApiRepo::new(&ApiConfig {
            base_url: "http://127.0.0.1:9".into(),
            request_timeout_ms: 500,
        })
        .unwrap();
        Supervisor {
            api: Arc::new(api),
            store: Arc::new(ViewModelStore::new(5, 16)),
            cancel: CancellationToken::new(),
            config: PollerConfig {
                topology_refresh_interval_ms: 60_000,
                matcher: KindMatcher::from(&TopologyConfig::default()),
                sensors_interval_ms: 60_000,
                fetch_config: false,
                sparkline: SparklineConfig {
                    interval_ms: 60_000,
                    ..SparklineConfig::default()
                },
                stats_log_interval_secs: 3600,
            },
            sensor_subs: HashMap::new(),
            sparkline_subs: HashMap::new(),
            refreshes_total: 0,
            refresh_failures_total: 0,
            restarts_total: 0,
        }
    }

    #[tokio::test]
    async fn unchanged_resources_keep_their_subscription() {
        let mut sup = supervisor();
        let resources = vec![resource("h1", ResourceKind::Host, "app1")];
        sup.apply(Topology::new(1, resources.clone())).await;
        sup.apply(Topology::new(2, resources)).await;

        assert_eq!(sup.sensor_subs.len(), 1);
        assert_eq!(sup.sparkline_subs.len(), 1);
        assert_eq!(sup.restarts_total, 0);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn retyped_resource_gets_a_fresh_subscription() {
        let mut sup = supervisor();
        sup.apply(Topology::new(1, vec![resource("x", ResourceKind::Host, "app1")]))
            .await;
        sup.apply(Topology::new(2, vec![resource("x", ResourceKind::Container, "app2")]))
            .await;

        assert_eq!(sup.restarts_total, 1);
        let polled = &sup.sensor_subs["x"].resource;
        assert_eq!(polled.kind, ResourceKind::Container);
        assert_eq!(polled.application_id, "app2");
        // app1 has no resources left.
        let apps: Vec<&str> = sup.sparkline_subs.keys().map(String::as_str).collect();
        assert_eq!(apps, vec!["app2"]);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn removed_resource_subscription_is_cancelled() {
        let mut sup = supervisor();
        sup.apply(Topology::new(
            1,
            vec![
                resource("h1", ResourceKind::Host, "app1"),
                resource("h2", ResourceKind::Host, "app1"),
            ],
        ))
        .await;
        sup.apply(Topology::new(2, vec![resource("h1", ResourceKind::Host, "app1")]))
            .await;

        assert!(sup.sensor_subs.contains_key("h1"));
        assert!(!sup.sensor_subs.contains_key("h2"));
        assert!(!sup.sensor_subs["h1"].sub.is_cancelled());
        sup.shutdown().await;
    }
}
