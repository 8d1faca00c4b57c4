use serde::Deserialize;

use crate::models::DEFAULT_SPARKLINE_CAPACITY;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub sparkline: SparklineConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Upstream monitoring REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Root URL, e.g. "http://localhost:8081"; `/v1/...` paths are appended.
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Topology refresh and the entity type names that classify resources.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    #[serde(default = "default_topology_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_infrastructure_type")]
    pub infrastructure_type: String,
    #[serde(default = "default_host_type")]
    pub host_type: String,
    #[serde(default = "default_container_type")]
    pub container_type: String,
    /// Intermediate grouping between a host and its containers (drill-down only).
    #[serde(default = "default_cluster_type")]
    pub cluster_type: String,
}

fn default_topology_refresh_interval_ms() -> u64 {
    5_000
}

fn default_infrastructure_type() -> String {
    "brooklyn.entity.container.docker.DockerInfrastructure".into()
}

fn default_host_type() -> String {
    "brooklyn.entity.container.docker.DockerHost".into()
}

fn default_container_type() -> String {
    "brooklyn.entity.container.docker.DockerContainer".into()
}

fn default_cluster_type() -> String {
    "brooklyn.entity.group.DynamicCluster".into()
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_topology_refresh_interval_ms(),
            infrastructure_type: default_infrastructure_type(),
            host_type: default_host_type(),
            container_type: default_container_type(),
            cluster_type: default_cluster_type(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorsConfig {
    #[serde(default = "default_sensors_interval_ms")]
    pub interval_ms: u64,
    /// Also fetch `config/current-state` on every sensor tick.
    #[serde(default = "default_true")]
    pub fetch_config: bool,
}

fn default_sensors_interval_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sensors_interval_ms(),
            fetch_config: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SparklineConfig {
    #[serde(default = "default_sparkline_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_sparkline_capacity")]
    pub capacity: usize,
    /// Numeric sensor sampled across each application's descendants.
    #[serde(default = "default_sparkline_sensor")]
    pub sensor: String,
    /// Entity type regex passed as `typeRegex` to the descendants endpoint.
    #[serde(default = "default_sparkline_type_regex")]
    pub type_regex: String,
    /// Multiplier applied to every sample (fractions → percent).
    #[serde(default = "default_sparkline_scale")]
    pub scale: f64,
}

fn default_sparkline_interval_ms() -> u64 {
    1_000
}

fn default_sparkline_capacity() -> usize {
    DEFAULT_SPARKLINE_CAPACITY
}

fn default_sparkline_sensor() -> String {
    "machine.cpu".into()
}

fn default_sparkline_type_regex() -> String {
    ".*DockerHost".into()
}

fn default_sparkline_scale() -> f64 {
    100.0
}

impl Default for SparklineConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sparkline_interval_ms(),
            capacity: default_sparkline_capacity(),
            sensor: default_sparkline_sensor(),
            type_regex: default_sparkline_type_regex(),
            scale: default_sparkline_scale(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of store events kept in the broadcast channel for /ws/resources (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log poller stats (resources, subscriptions, store entries) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"),
            "api.base_url must start with http:// or https://, got {:?}",
            self.api.base_url
        );
        anyhow::ensure!(
            self.api.request_timeout_ms > 0,
            "api.request_timeout_ms must be > 0, got {}",
            self.api.request_timeout_ms
        );
        anyhow::ensure!(
            self.topology.refresh_interval_ms > 0,
            "topology.refresh_interval_ms must be > 0, got {}",
            self.topology.refresh_interval_ms
        );
        for (key, value) in [
            ("topology.infrastructure_type", &self.topology.infrastructure_type),
            ("topology.host_type", &self.topology.host_type),
            ("topology.container_type", &self.topology.container_type),
            ("topology.cluster_type", &self.topology.cluster_type),
        ] {
            anyhow::ensure!(!value.is_empty(), "{} must be non-empty", key);
        }
        anyhow::ensure!(
            self.sensors.interval_ms > 0,
            "sensors.interval_ms must be > 0, got {}",
            self.sensors.interval_ms
        );
        anyhow::ensure!(
            self.sparkline.interval_ms > 0,
            "sparkline.interval_ms must be > 0, got {}",
            self.sparkline.interval_ms
        );
        anyhow::ensure!(
            self.sparkline.capacity > 0,
            "sparkline.capacity must be > 0, got {}",
            self.sparkline.capacity
        );
        anyhow::ensure!(
            !self.sparkline.sensor.is_empty(),
            "sparkline.sensor must be non-empty"
        );
        anyhow::ensure!(
            self.sparkline.scale.is_finite(),
            "sparkline.scale must be finite, got {}",
            self.sparkline.scale
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
