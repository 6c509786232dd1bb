//! Persistence seam for readings, anomalies, and alert history.
//!
//! The daemon runs on [`MemoryStore`]; a durable backend plugs in behind
//! the same trait.

use async_trait::async_trait;
use emstream_types::{AlertInstance, AnomalyRecord, StreamMessage};
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("write failed: {0}")]
    Write(String),
}

#[async_trait]
pub trait Persistence: Send + Sync {
    async fn store_message(&self, message: &StreamMessage) -> Result<(), PersistError>;
    async fn store_anomaly(&self, record: &AnomalyRecord) -> Result<(), PersistError>;
    async fn store_alert(&self, instance: &AlertInstance) -> Result<(), PersistError>;
}

/// Bounded in-memory store. Each collection evicts oldest-first at capacity.
pub struct MemoryStore {
    messages: Mutex<VecDeque<StreamMessage>>,
    anomalies: Mutex<VecDeque<AnomalyRecord>>,
    alerts: Mutex<VecDeque<AlertInstance>>,
    message_capacity: usize,
    anomaly_capacity: usize,
    alert_capacity: usize,
}

impl MemoryStore {
    pub const DEFAULT_MESSAGES: usize = 10_000;
    pub const DEFAULT_ANOMALIES: usize = 1_000;
    pub const DEFAULT_ALERTS: usize = 10_000;

    pub fn new(message_capacity: usize, anomaly_capacity: usize, alert_capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            anomalies: Mutex::new(VecDeque::new()),
            alerts: Mutex::new(VecDeque::new()),
            message_capacity: message_capacity.max(1),
            anomaly_capacity: anomaly_capacity.max(1),
            alert_capacity: alert_capacity.max(1),
        }
    }

    /// The most recent anomalies, newest first.
    pub fn recent_anomalies(&self, limit: usize) -> Vec<AnomalyRecord> {
        self.anomalies
            .lock()
            .expect("anomaly store lock poisoned")
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.lock().expect("anomaly store lock poisoned").len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().expect("message store lock poisoned").len()
    }

    fn push_bounded<T>(queue: &Mutex<VecDeque<T>>, capacity: usize, item: T) {
        let mut queue = queue.lock().expect("store lock poisoned");
        if queue.len() >= capacity {
            queue.pop_front();
        }
        queue.push_back(item);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MESSAGES,
            Self::DEFAULT_ANOMALIES,
            Self::DEFAULT_ALERTS,
        )
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn store_message(&self, message: &StreamMessage) -> Result<(), PersistError> {
        Self::push_bounded(&self.messages, self.message_capacity, message.clone());
        Ok(())
    }

    async fn store_anomaly(&self, record: &AnomalyRecord) -> Result<(), PersistError> {
        Self::push_bounded(&self.anomalies, self.anomaly_capacity, record.clone());
        Ok(())
    }

    async fn store_alert(&self, instance: &AlertInstance) -> Result<(), PersistError> {
        Self::push_bounded(&self.alerts, self.alert_capacity, instance.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emstream_types::{AnomalyResult, Trend};

    fn record(value: f64) -> AnomalyRecord {
        let message = StreamMessage {
            timestamp: Utc::now(),
            device_id: "meter-1".to_string(),
            metric_type: "voltage".to_string(),
            value,
            unit: String::new(),
            quality: Default::default(),
            metadata: Default::default(),
        };
        let analysis = AnomalyResult {
            is_anomaly: true,
            anomaly_score: 4.2,
            trend: Trend::Stable,
            mean: 230.0,
            stddev: 1.0,
            scored_at: Utc::now(),
        };
        AnomalyRecord::new(message, analysis)
    }

    #[tokio::test]
    async fn anomaly_log_is_bounded_and_newest_first() {
        let store = MemoryStore::new(100, 3, 100);
        for i in 0..5 {
            store.store_anomaly(&record(f64::from(i))).await.unwrap();
        }

        assert_eq!(store.anomaly_count(), 3);
        let recent = store.recent_anomalies(10);
        let values: Vec<f64> = recent.iter().map(|r| r.message.value).collect();
        assert_eq!(values, vec![4.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn recent_anomalies_respects_limit() {
        let store = MemoryStore::default();
        for i in 0..10 {
            store.store_anomaly(&record(f64::from(i))).await.unwrap();
        }
        assert_eq!(store.recent_anomalies(4).len(), 4);
    }
}
