//! Telemetry message types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Quality flag attached to each telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Good,
    Uncertain,
    Bad,
}

/// One telemetry sample from a meter or device.
///
/// Immutable after creation; retained in the stream buffer up to its
/// capacity/age limit, then evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Sample timestamp. Expected non-decreasing per (device, metric) stream.
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Originating device identifier.
    pub device_id: String,

    /// Metric name, e.g. `voltage` or `power_consumption`.
    pub metric_type: String,

    /// Sampled value.
    pub value: f64,

    /// Unit of measurement, e.g. `V` or `W`.
    #[serde(default)]
    pub unit: String,

    /// Sample quality flag.
    #[serde(default)]
    pub quality: Quality,

    /// Opaque key-value metadata carried through the pipeline.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StreamMessage {
    /// The per-stream key this message belongs to.
    pub fn metric_key(&self) -> MetricKey {
        MetricKey::new(&self.device_id, &self.metric_type)
    }

    /// Broadcast topic for this message: `{device_id}:{metric_type}`.
    pub fn topic(&self) -> String {
        format!("{}:{}", self.device_id, self.metric_type)
    }
}

/// Key identifying one (device, metric) stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub device_id: String,
    pub metric_type: String,
}

impl MetricKey {
    pub fn new(device_id: impl Into<String>, metric_type: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            metric_type: metric_type.into(),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_id, self.metric_type)
    }
}
