//! Synthetic meter-reading generator for demos and load testing.

use emstream_types::{Quality, StreamMessage};
use rand::Rng;

const DEVICES: [&str; 5] = ["meter-001", "meter-002", "meter-003", "meter-004", "meter-005"];

/// (metric, unit, baseline, jitter)
const METRICS: [(&str, &str, f64, f64); 5] = [
    ("voltage", "V", 230.0, 2.0),
    ("current", "A", 10.0, 1.5),
    ("power", "W", 2500.0, 300.0),
    ("power_factor", "", 0.92, 0.02),
    ("temperature", "C", 45.0, 5.0),
];

/// Probability that a reading is replaced by an injected outlier.
const ANOMALY_RATE: f64 = 0.05;

/// Generate `count` readings cycling devices and metrics, with roughly 5%
/// injected outliers.
pub fn generate(count: usize) -> Vec<StreamMessage> {
    let mut rng = rand::thread_rng();
    let mut messages = Vec::with_capacity(count);

    for i in 0..count {
        let device_id = DEVICES[i % DEVICES.len()];
        let (metric_type, unit, baseline, jitter) = METRICS[(i / DEVICES.len()) % METRICS.len()];

        let mut value = baseline + jitter * rng.gen_range(-1.0..1.0);
        let mut quality = Quality::Good;
        if rng.gen_bool(ANOMALY_RATE) {
            value *= rng.gen_range(2.0..4.0);
            quality = Quality::Uncertain;
        }

        messages.push(StreamMessage {
            timestamp: chrono::Utc::now(),
            device_id: device_id.to_string(),
            metric_type: metric_type.to_string(),
            value,
            unit: unit.to_string(),
            quality,
            metadata: Default::default(),
        });
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_count() {
        let messages = generate(100);
        assert_eq!(messages.len(), 100);
        assert!(messages.iter().all(|m| !m.device_id.is_empty()));
        assert!(messages.iter().all(|m| m.value.is_finite()));
    }

    #[test]
    fn cycles_all_devices_and_metrics() {
        let messages = generate(25);
        for device in DEVICES {
            assert!(messages.iter().any(|m| m.device_id == device));
        }
        let metrics: std::collections::HashSet<&str> =
            messages.iter().map(|m| m.metric_type.as_str()).collect();
        assert!(metrics.len() >= 2);
    }
}
