//! Active-alert ownership, notification dispatch, and escalation scheduling.

use crate::evaluator::Evaluation;
use crate::notify::Notifier;
use emstream_types::{AlertDefinition, AlertInstance, EscalationRule, Severity};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("no active alert found for {0}")]
    NotFound(String),
}

/// Owns the set of active alert instances.
///
/// Firing, resolution, and acknowledgment mutate the active set; escalation
/// runs as one cancellable task per instance. Notification delivery is
/// best-effort and never gates a state transition.
pub struct AlertManager {
    notifier: Arc<dyn Notifier>,
    active: Mutex<HashMap<String, AlertInstance>>,
    history: Mutex<VecDeque<AlertInstance>>,
    history_capacity: usize,
    escalations: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl AlertManager {
    /// Default bounded-history capacity.
    pub const DEFAULT_HISTORY: usize = 10_000;

    pub fn new(notifier: Arc<dyn Notifier>, history_capacity: usize) -> Self {
        Self {
            notifier,
            active: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            history_capacity: history_capacity.max(1),
            escalations: Mutex::new(HashMap::new()),
        }
    }

    /// Apply an evaluator outcome: fire or resolve, ignore the rest.
    pub async fn handle(self: &Arc<Self>, definition: &AlertDefinition, evaluation: Evaluation) {
        match evaluation {
            Evaluation::Fired(instance) => self.fire(definition, instance).await,
            Evaluation::Resolved(instance) => self.resolve(definition, instance).await,
            Evaluation::Pending | Evaluation::Updated | Evaluation::Idle => {}
        }
    }

    /// Persist a newly fired instance, send the initial notification, and
    /// schedule escalation when the definition carries rules.
    pub async fn fire(self: &Arc<Self>, definition: &AlertDefinition, instance: AlertInstance) {
        let instance_id = instance.instance_id.clone();
        {
            let mut active = self.active.lock().expect("active alerts lock poisoned");
            active.insert(instance_id.clone(), instance.clone());
        }

        tracing::warn!(
            alert_id = %definition.alert_id,
            instance_id = %instance_id,
            value = instance.current_value,
            threshold = instance.threshold,
            "alert fired"
        );

        let message = format!(
            "{} (value {:.3}, threshold {:.3})",
            definition.description, instance.current_value, instance.threshold
        );
        if let Err(err) = self
            .notifier
            .send(
                definition.severity,
                &definition.name,
                &message,
                &definition.notification_channels,
            )
            .await
        {
            tracing::warn!(alert_id = %definition.alert_id, %err, "fire notification failed");
        }

        if !definition.escalation_rules.is_empty() {
            self.schedule_escalation(definition.clone(), instance_id);
        }
    }

    /// Remove a resolved instance from the active set, cancel its escalation
    /// task, notify, and append it to bounded history.
    pub async fn resolve(self: &Arc<Self>, definition: &AlertDefinition, instance: AlertInstance) {
        let removed = {
            let mut active = self.active.lock().expect("active alerts lock poisoned");
            active.remove(&instance.instance_id)
        };
        if removed.is_none() {
            tracing::debug!(instance_id = %instance.instance_id, "resolve for unknown instance");
        }
        self.cancel_escalation(&instance.instance_id);

        let duration = instance
            .resolved_at
            .map(|resolved| resolved - instance.fired_at)
            .unwrap_or_else(chrono::Duration::zero);
        let message = format!("Alert resolved after {}s", duration.num_seconds());
        if let Err(err) = self
            .notifier
            .send(
                Severity::Info,
                &format!("RESOLVED: {}", definition.name),
                &message,
                &definition.notification_channels,
            )
            .await
        {
            tracing::warn!(alert_id = %definition.alert_id, %err, "resolve notification failed");
        }

        tracing::info!(
            alert_id = %definition.alert_id,
            instance_id = %instance.instance_id,
            "alert resolved"
        );

        let mut history = self.history.lock().expect("alert history lock poisoned");
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(instance);
    }

    /// Mark the first active instance of `alert_id` acknowledged and halt
    /// its escalation without resolving it.
    pub fn acknowledge(&self, alert_id: &str, by: &str) -> Result<AlertInstance, AlertError> {
        let acknowledged = {
            let mut active = self.active.lock().expect("active alerts lock poisoned");
            let instance = active
                .values_mut()
                .find(|instance| instance.alert_id == alert_id)
                .ok_or_else(|| AlertError::NotFound(alert_id.to_string()))?;
            instance.acknowledged = true;
            instance.acknowledged_by = Some(by.to_string());
            instance.acknowledged_at = Some(chrono::Utc::now());
            instance.clone()
        };

        self.cancel_escalation(&acknowledged.instance_id);
        tracing::info!(alert_id, by, "alert acknowledged");
        Ok(acknowledged)
    }

    /// Snapshot of currently active instances.
    pub fn active_alerts(&self) -> Vec<AlertInstance> {
        self.active
            .lock()
            .expect("active alerts lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().expect("active alerts lock poisoned").len()
    }

    /// Number of escalation tasks currently scheduled.
    pub fn pending_escalations(&self) -> usize {
        self.escalations
            .lock()
            .expect("escalation map lock poisoned")
            .len()
    }

    /// Snapshot of resolved history, oldest first.
    pub fn history(&self) -> Vec<AlertInstance> {
        self.history
            .lock()
            .expect("alert history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    fn schedule_escalation(self: &Arc<Self>, definition: AlertDefinition, instance_id: String) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        {
            let mut escalations = self.escalations.lock().expect("escalation map lock poisoned");
            // A re-fired instance replaces any stale task handle.
            if let Some(previous) = escalations.insert(instance_id.clone(), cancel_tx) {
                let _ = previous.send(true);
            }
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager
                .run_escalation(definition, instance_id, cancel_rx)
                .await;
        });
    }

    async fn run_escalation(
        self: Arc<Self>,
        definition: AlertDefinition,
        instance_id: String,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        for rule in &definition.escalation_rules {
            let delay = Duration::from_secs(rule.delay_minutes * 60);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx.changed() => {
                    tracing::debug!(%instance_id, "escalation cancelled");
                    return;
                }
            }

            // Re-check instance state after every sleep: a concurrent
            // resolve or acknowledge terminates the ladder.
            let escalated = self.escalate(&instance_id);
            let Some(instance) = escalated else {
                // No cancel signal was observed, so the map entry still
                // belongs to this task and must be removed here.
                if !cancel_rx.has_changed().unwrap_or(true) {
                    let mut escalations =
                        self.escalations.lock().expect("escalation map lock poisoned");
                    escalations.remove(&instance_id);
                }
                return;
            };

            let channels = if rule.channels.is_empty() {
                &definition.notification_channels
            } else {
                &rule.channels
            };
            let message = format!(
                "Alert escalated to level {} (value {:.3}, threshold {:.3})",
                instance.escalation_level, instance.current_value, instance.threshold
            );
            if let Err(err) = self
                .notifier
                .send(
                    Severity::Critical,
                    &format!("ESCALATED: {}", definition.name),
                    &message,
                    channels,
                )
                .await
            {
                tracing::warn!(%instance_id, %err, "escalation notification failed");
            }
            tracing::error!(
                alert_id = %definition.alert_id,
                %instance_id,
                level = instance.escalation_level,
                "alert escalated"
            );
        }

        let mut escalations = self.escalations.lock().expect("escalation map lock poisoned");
        escalations.remove(&instance_id);
    }

    /// Bump the escalation level if the instance is still active and
    /// unacknowledged; `None` terminates the escalation task.
    fn escalate(&self, instance_id: &str) -> Option<AlertInstance> {
        let mut active = self.active.lock().expect("active alerts lock poisoned");
        let instance = active.get_mut(instance_id)?;
        if instance.acknowledged {
            return None;
        }
        instance.escalation_level += 1;
        Some(instance.clone())
    }

    fn cancel_escalation(&self, instance_id: &str) {
        let sender = {
            let mut escalations = self.escalations.lock().expect("escalation map lock poisoned");
            escalations.remove(instance_id)
        };
        if let Some(sender) = sender {
            let _ = sender.send(true);
        }
    }
}

/// Convenience for the common escalation ladder shape.
pub fn escalation_ladder(delays_minutes: &[u64]) -> Vec<EscalationRule> {
    delays_minutes
        .iter()
        .map(|&delay_minutes| EscalationRule {
            delay_minutes,
            channels: Vec::new(),
        })
        .collect()
}
