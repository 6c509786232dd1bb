//! Per-definition alert state machine with duration debouncing.

use emstream_types::{AlertDefinition, AlertInstance, AlertState};
use std::collections::{BTreeMap, HashMap};

/// Outcome of one evaluation step.
#[derive(Debug, Clone)]
pub enum Evaluation {
    /// Condition transitioned into a sustained breach: a new instance fired.
    Fired(AlertInstance),
    /// Condition is true but has not yet held for the definition's duration.
    Pending,
    /// Condition still true for an already-firing instance; value refreshed.
    Updated,
    /// Condition became false for a firing instance; carries the resolved
    /// instance for notification purposes.
    Resolved(AlertInstance),
    /// Condition false, nothing tracked.
    Idle,
}

enum KeyState {
    /// Condition first seen true at this time; waiting out the duration.
    Pending {
        since: chrono::DateTime<chrono::Utc>,
    },
    Firing(AlertInstance),
}

/// Stateful evaluator keyed by (alert id, sorted label set).
///
/// Distinct label combinations of the same definition are tracked
/// independently. Re-firing after resolution creates a fresh instance with a
/// new `fired_at`.
pub struct AlertEvaluator {
    states: HashMap<String, KeyState>,
}

impl AlertEvaluator {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Evaluate `value` against a definition for the given label set.
    pub fn evaluate(
        &mut self,
        definition: &AlertDefinition,
        value: f64,
        labels: BTreeMap<String, String>,
    ) -> Evaluation {
        self.evaluate_at(definition, value, labels, chrono::Utc::now())
    }

    /// Evaluation with an explicit clock, for deterministic tests.
    pub fn evaluate_at(
        &mut self,
        definition: &AlertDefinition,
        value: f64,
        labels: BTreeMap<String, String>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Evaluation {
        let condition_true = definition.comparison.evaluate(value, definition.threshold);
        let key = AlertInstance::derive_key(&definition.alert_id, &labels);

        match (condition_true, self.states.remove(&key)) {
            (true, None) => {
                if definition.duration_secs == 0 {
                    let instance = self.fire(definition, value, labels, now, &key);
                    Evaluation::Fired(instance)
                } else {
                    self.states.insert(key, KeyState::Pending { since: now });
                    Evaluation::Pending
                }
            }
            (true, Some(KeyState::Pending { since })) => {
                let held = (now - since).num_seconds();
                if held >= definition.duration_secs as i64 {
                    let instance = self.fire(definition, value, labels, now, &key);
                    Evaluation::Fired(instance)
                } else {
                    self.states.insert(key, KeyState::Pending { since });
                    Evaluation::Pending
                }
            }
            (true, Some(KeyState::Firing(mut instance))) => {
                instance.current_value = value;
                self.states.insert(key, KeyState::Firing(instance));
                Evaluation::Updated
            }
            (false, Some(KeyState::Firing(mut instance))) => {
                instance.state = AlertState::Resolved;
                instance.resolved_at = Some(now);
                instance.current_value = value;
                Evaluation::Resolved(instance)
            }
            (false, Some(KeyState::Pending { .. })) | (false, None) => Evaluation::Idle,
        }
    }

    fn fire(
        &mut self,
        definition: &AlertDefinition,
        value: f64,
        labels: BTreeMap<String, String>,
        now: chrono::DateTime<chrono::Utc>,
        key: &str,
    ) -> AlertInstance {
        let instance = AlertInstance {
            instance_id: key.to_string(),
            alert_id: definition.alert_id.clone(),
            state: AlertState::Firing,
            fired_at: now,
            resolved_at: None,
            current_value: value,
            threshold: definition.threshold,
            labels,
            escalation_level: 0,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
        };
        self.states
            .insert(key.to_string(), KeyState::Firing(instance.clone()));
        instance
    }

    /// Number of keys currently pending or firing.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emstream_types::{Comparison, Severity};

    fn definition(duration_secs: u64) -> AlertDefinition {
        AlertDefinition {
            alert_id: "voltage_high".to_string(),
            name: "High Voltage".to_string(),
            description: "Voltage above limit".to_string(),
            severity: Severity::Warning,
            condition: "voltage".to_string(),
            threshold: 240.0,
            comparison: Comparison::GreaterThan,
            duration_secs,
            evaluation_interval_secs: 30,
            escalation_rules: Vec::new(),
            notification_channels: vec!["email".to_string()],
            tags: Default::default(),
        }
    }

    fn labels(device: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("device_id".to_string(), device.to_string());
        map
    }

    #[test]
    fn fires_then_resolves_once() {
        let mut evaluator = AlertEvaluator::new();
        let def = definition(0);

        let fired = evaluator.evaluate(&def, 245.0, labels("m1"));
        let instance = match fired {
            Evaluation::Fired(instance) => instance,
            other => panic!("expected Fired, got {:?}", other),
        };
        assert_eq!(instance.current_value, 245.0);
        assert_eq!(instance.state, AlertState::Firing);

        // Still breaching: no second instance.
        assert!(matches!(
            evaluator.evaluate(&def, 250.0, labels("m1")),
            Evaluation::Updated
        ));

        let resolved = evaluator.evaluate(&def, 200.0, labels("m1"));
        let resolved = match resolved {
            Evaluation::Resolved(instance) => instance,
            other => panic!("expected Resolved, got {:?}", other),
        };
        assert_eq!(resolved.instance_id, instance.instance_id);
        assert!(resolved.resolved_at.unwrap() >= resolved.fired_at);

        // Back to quiet.
        assert!(matches!(
            evaluator.evaluate(&def, 200.0, labels("m1")),
            Evaluation::Idle
        ));
    }

    #[test]
    fn refiring_creates_fresh_instance() {
        let mut evaluator = AlertEvaluator::new();
        let def = definition(0);

        let first = match evaluator.evaluate(&def, 245.0, labels("m1")) {
            Evaluation::Fired(i) => i,
            other => panic!("expected Fired, got {:?}", other),
        };
        let _ = evaluator.evaluate(&def, 200.0, labels("m1"));
        let second = match evaluator.evaluate(&def, 246.0, labels("m1")) {
            Evaluation::Fired(i) => i,
            other => panic!("expected Fired, got {:?}", other),
        };

        assert_eq!(first.instance_id, second.instance_id);
        assert!(second.fired_at >= first.fired_at);
        assert!(second.resolved_at.is_none());
    }

    #[test]
    fn label_sets_tracked_independently() {
        let mut evaluator = AlertEvaluator::new();
        let def = definition(0);

        assert!(matches!(
            evaluator.evaluate(&def, 245.0, labels("m1")),
            Evaluation::Fired(_)
        ));
        assert!(matches!(
            evaluator.evaluate(&def, 245.0, labels("m2")),
            Evaluation::Fired(_)
        ));
        assert_eq!(evaluator.tracked(), 2);

        assert!(matches!(
            evaluator.evaluate(&def, 200.0, labels("m1")),
            Evaluation::Resolved(_)
        ));
        assert_eq!(evaluator.tracked(), 1);
    }

    #[test]
    fn duration_debounces_firing() {
        let mut evaluator = AlertEvaluator::new();
        let def = definition(60);
        let t0 = chrono::Utc::now();

        assert!(matches!(
            evaluator.evaluate_at(&def, 245.0, labels("m1"), t0),
            Evaluation::Pending
        ));
        assert!(matches!(
            evaluator.evaluate_at(&def, 246.0, labels("m1"), t0 + chrono::Duration::seconds(30)),
            Evaluation::Pending
        ));

        let fired =
            evaluator.evaluate_at(&def, 247.0, labels("m1"), t0 + chrono::Duration::seconds(61));
        assert!(matches!(fired, Evaluation::Fired(_)));
    }

    #[test]
    fn pending_clears_when_condition_drops() {
        let mut evaluator = AlertEvaluator::new();
        let def = definition(60);
        let t0 = chrono::Utc::now();

        assert!(matches!(
            evaluator.evaluate_at(&def, 245.0, labels("m1"), t0),
            Evaluation::Pending
        ));
        // Condition drops before the duration elapses; nothing fires.
        assert!(matches!(
            evaluator.evaluate_at(&def, 200.0, labels("m1"), t0 + chrono::Duration::seconds(30)),
            Evaluation::Idle
        ));
        // A later breach starts the hold period over.
        assert!(matches!(
            evaluator.evaluate_at(&def, 245.0, labels("m1"), t0 + chrono::Duration::seconds(90)),
            Evaluation::Pending
        ));
    }
}
