// Domain models: topology resources, sensor state, sparklines and view entries

mod resource;
mod sensor;
mod sparkline;
mod summary;
mod view;

pub use resource::{EntityDescriptor, Resource, ResourceKind, TreeNode};
pub use sensor::{SensorReading, numeric};
pub use sparkline::{DEFAULT_SPARKLINE_CAPACITY, Sample, SparklineSeries};
pub use summary::EntitySummary;
pub use view::{StaleMarker, StoreChange, StoreEvent, ViewEntry};

/// Current unix time in seconds (0 if the clock is before the epoch).
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp().max(0)
}
