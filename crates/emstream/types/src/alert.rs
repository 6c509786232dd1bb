//! Alert definitions, instances, and the firing state machine vocabulary.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Comparison operator applied between a scalar value and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl Comparison {
    /// Apply the operator: `value <op> threshold`.
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::LessThan => value < threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::LessOrEqual => value <= threshold,
            Comparison::Equal => value == threshold,
            Comparison::NotEqual => value != threshold,
        }
    }
}

/// One step of an escalation ladder: wait `delay_minutes`, then notify the
/// given channels if the alert is still firing and unacknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub delay_minutes: u64,

    /// Channels for this escalation level. Falls back to the definition's
    /// default channels when empty.
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Static configuration of a condition to watch.
///
/// Loaded at startup and hot-reloadable; never mutated by the evaluation
/// loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDefinition {
    pub alert_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,

    /// Metric selector: matched against a message's metric type or
    /// `{device_id}:{metric_type}` topic.
    pub condition: String,

    pub threshold: f64,
    pub comparison: Comparison,

    /// Seconds the condition must hold continuously before the alert fires.
    /// Zero fires on the first true evaluation.
    #[serde(default)]
    pub duration_secs: u64,

    /// How often the condition is expected to be evaluated, in seconds.
    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval_secs: u64,

    #[serde(default)]
    pub escalation_rules: Vec<EscalationRule>,

    #[serde(default)]
    pub notification_channels: Vec<String>,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_evaluation_interval() -> u64 {
    30
}

/// Lifecycle state of an alert instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// Condition true but not yet held for the definition's duration.
    Pending,
    /// Condition held; notifications and escalation are live.
    Firing,
    /// Condition became false; moved to history.
    Resolved,
}

/// One active or historical occurrence of a definition firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertInstance {
    /// Derived from alert id + sorted label set; stable for the same labels.
    pub instance_id: String,

    pub alert_id: String,
    pub state: AlertState,
    pub fired_at: chrono::DateTime<chrono::Utc>,
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
    pub current_value: f64,
    pub threshold: f64,

    /// Label set distinguishing this instance from others of the same
    /// definition, e.g. `{"device_id": "meter_001"}`.
    pub labels: BTreeMap<String, String>,

    pub escalation_level: u32,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl AlertInstance {
    /// Derive the instance key for a definition and label set. Labels are
    /// iterated in sorted order so the key is independent of insertion order.
    pub fn derive_key(alert_id: &str, labels: &BTreeMap<String, String>) -> String {
        let mut hasher = DefaultHasher::new();
        for (k, v) in labels {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        format!("{}:{:016x}", alert_id, hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_operators() {
        assert!(Comparison::GreaterThan.evaluate(245.0, 240.0));
        assert!(!Comparison::GreaterThan.evaluate(240.0, 240.0));
        assert!(Comparison::LessThan.evaluate(200.0, 210.0));
        assert!(Comparison::GreaterOrEqual.evaluate(240.0, 240.0));
        assert!(Comparison::LessOrEqual.evaluate(240.0, 240.0));
        assert!(Comparison::Equal.evaluate(1.0, 1.0));
        assert!(Comparison::NotEqual.evaluate(1.0, 2.0));
    }

    #[test]
    fn comparison_serde_symbols() {
        assert_eq!(serde_json::to_string(&Comparison::GreaterThan).unwrap(), "\">\"");
        let op: Comparison = serde_json::from_str("\"<=\"").unwrap();
        assert_eq!(op, Comparison::LessOrEqual);
    }

    #[test]
    fn instance_key_is_order_independent_and_label_sensitive() {
        let mut a = BTreeMap::new();
        a.insert("device_id".to_string(), "m1".to_string());
        a.insert("zone".to_string(), "b".to_string());

        let mut b = BTreeMap::new();
        b.insert("zone".to_string(), "b".to_string());
        b.insert("device_id".to_string(), "m1".to_string());

        assert_eq!(
            AlertInstance::derive_key("high_voltage", &a),
            AlertInstance::derive_key("high_voltage", &b)
        );

        let mut c = a.clone();
        c.insert("device_id".to_string(), "m2".to_string());
        assert_ne!(
            AlertInstance::derive_key("high_voltage", &a),
            AlertInstance::derive_key("high_voltage", &c)
        );
    }
}
