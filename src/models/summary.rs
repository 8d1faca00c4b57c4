// Entity summary panel fields derived from a sensor reading

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SensorReading;

pub const SENSOR_SERVICE_STATE: &str = "service.state";
pub const SENSOR_SERVICE_UP: &str = "service.isUp";
pub const SENSOR_MAPPED_MAIN_URI: &str = "mapped.main.uri";
pub const SENSOR_MAIN_URI: &str = "main.uri";
pub const SENSOR_SERVICE_PROBLEMS: &str = "service.problems";
pub const SENSOR_NOT_UP_INDICATORS: &str = "service.notUp.indicators";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub id: String,
    pub status: Option<String>,
    /// `Some(false)` is a reported value, distinct from the sensor being absent.
    pub service_up: Option<bool>,
    pub url: Option<String>,
    /// Problem descriptions, from `service.problems` or else `service.notUp.indicators`.
    pub problems: Option<Vec<String>>,
    pub has_problem: bool,
}

impl EntitySummary {
    pub fn from_sensors(id: &str, sensors: &SensorReading) -> Self {
        let status = sensors.get(SENSOR_SERVICE_STATE).and_then(display_string);
        let service_up = sensors.get(SENSOR_SERVICE_UP).and_then(as_bool);
        let url = sensors
            .get(SENSOR_MAPPED_MAIN_URI)
            .and_then(display_string)
            .or_else(|| sensors.get(SENSOR_MAIN_URI).and_then(display_string));
        let problems = sensors
            .get(SENSOR_SERVICE_PROBLEMS)
            .and_then(problem_texts)
            .or_else(|| sensors.get(SENSOR_NOT_UP_INDICATORS).and_then(problem_texts));

        let on_fire = status.as_deref() == Some("on-fire");
        let down_while_running = status.as_deref() == Some("running") && service_up == Some(false);
        let has_problem = problems.is_some() || on_fire || down_while_running;

        Self {
            id: id.to_string(),
            status,
            service_up,
            url,
            problems,
            has_problem,
        }
    }
}

/// Non-empty scalar rendered as text; `null` and empty strings count as absent.
fn display_string(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Problem indicators arrive as a map (key → text) or a list. Empty collections are no problem.
fn problem_texts(v: &Value) -> Option<Vec<String>> {
    let texts: Vec<String> = match v {
        Value::Object(m) => m.values().filter_map(display_string).collect(),
        Value::Array(a) => a.iter().filter_map(display_string).collect(),
        Value::Null => Vec::new(),
        other => display_string(other).into_iter().collect(),
    };
    if texts.is_empty() { None } else { Some(texts) }
}
