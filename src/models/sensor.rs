// Sensor and config current-state maps

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sensor name → current value as returned by `sensors/current-state` (or `config/current-state`).
/// Values stay dynamically typed; a poll replaces the whole map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorReading(pub Map<String, Value>);

impl SensorReading {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Numeric value of `name`; JSON numbers and numeric strings both count.
    pub fn number(&self, name: &str) -> Option<f64> {
        numeric(self.get(name)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for SensorReading {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Interprets a sample value as a number. `null`, booleans and objects are not samples.
pub fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}
