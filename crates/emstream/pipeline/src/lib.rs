//! Ingestion pipeline wiring buffering, scoring, alert evaluation,
//! persistence, and fan-out into a single ordered path per reading.

#![deny(unsafe_code)]

mod persist;
mod validate;

pub use persist::{MemoryStore, PersistError, Persistence};
pub use validate::{validate, ValidationError};

use dashmap::DashMap;
use emstream_alerts::{AlertEvaluator, AlertManager, Evaluation};
use emstream_broker::{BrokerEvent, SubscriptionBroker};
use emstream_detect::Scorer;
use emstream_stream::{BufferStats, RollingStatistics, StreamBuffer};
use emstream_types::{AlertDefinition, AnomalyRecord, AnomalyResult, StreamMessage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Latest scored reading for one device metric.
#[derive(Debug, Clone, Serialize)]
pub struct LatestReading {
    pub message: StreamMessage,
    pub analysis: AnomalyResult,
}

/// Counters and sizes exposed through the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub received: u64,
    pub rejected: u64,
    pub anomalies_detected: u64,
    pub buffer: BufferStats,
    pub tracked_streams: usize,
    pub active_alerts: usize,
}

/// The per-reading processing path.
///
/// Order is fixed: validate, buffer, update rolling statistics, score,
/// evaluate alert definitions, persist, fan out. Persistence failures are
/// logged and never fail an ingest.
pub struct IngestionPipeline {
    buffer: StreamBuffer,
    stats: RollingStatistics,
    scorer: Arc<dyn Scorer>,
    evaluator: Mutex<AlertEvaluator>,
    manager: Arc<AlertManager>,
    broker: Arc<SubscriptionBroker>,
    store: Arc<dyn Persistence>,
    definitions: RwLock<Vec<AlertDefinition>>,
    latest: DashMap<String, BTreeMap<String, LatestReading>>,
    received: AtomicU64,
    rejected: AtomicU64,
    anomalies_detected: AtomicU64,
}

impl IngestionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buffer: StreamBuffer,
        stats: RollingStatistics,
        scorer: Arc<dyn Scorer>,
        manager: Arc<AlertManager>,
        broker: Arc<SubscriptionBroker>,
        store: Arc<dyn Persistence>,
        definitions: Vec<AlertDefinition>,
    ) -> Self {
        Self {
            buffer,
            stats,
            scorer,
            evaluator: Mutex::new(AlertEvaluator::new()),
            manager,
            broker,
            store,
            definitions: RwLock::new(definitions),
            latest: DashMap::new(),
            received: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            anomalies_detected: AtomicU64::new(0),
        }
    }

    /// Run one reading through the pipeline and return its analysis.
    pub async fn ingest(self: &Arc<Self>, message: StreamMessage) -> Result<AnomalyResult, ValidationError> {
        if let Err(err) = validate(&message) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%err, "message rejected");
            return Err(err);
        }
        self.received.fetch_add(1, Ordering::Relaxed);

        self.buffer.add(message.clone());
        let snapshot = self.stats.update(message.metric_key(), message.value);
        let analysis = self.scorer.score(&message, &snapshot);

        if analysis.is_anomaly {
            self.anomalies_detected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                device_id = %message.device_id,
                metric_type = %message.metric_type,
                value = message.value,
                score = analysis.anomaly_score,
                "anomaly detected"
            );
        }

        self.evaluate_alerts(&message).await;

        if analysis.is_anomaly {
            let record = AnomalyRecord::new(message.clone(), analysis.clone());
            if let Err(err) = self.store.store_anomaly(&record).await {
                tracing::warn!(%err, "anomaly persistence failed");
            }
        }
        if let Err(err) = self.store.store_message(&message).await {
            tracing::warn!(%err, "message persistence failed");
        }

        self.latest
            .entry(message.device_id.clone())
            .or_default()
            .insert(
                message.metric_type.clone(),
                LatestReading {
                    message: message.clone(),
                    analysis: analysis.clone(),
                },
            );

        let topic = message.topic();
        self.broker.broadcast(
            &topic,
            &BrokerEvent::Reading {
                message,
                analysis: analysis.clone(),
            },
        );

        Ok(analysis)
    }

    async fn evaluate_alerts(self: &Arc<Self>, message: &StreamMessage) {
        let matching: Vec<AlertDefinition> = {
            let definitions = self.definitions.read().expect("definitions lock poisoned");
            definitions
                .iter()
                .filter(|def| {
                    def.condition == message.metric_type || def.condition == message.topic()
                })
                .cloned()
                .collect()
        };

        for definition in matching {
            let mut labels = BTreeMap::new();
            labels.insert("device_id".to_string(), message.device_id.clone());
            labels.insert("metric_type".to_string(), message.metric_type.clone());

            let evaluation = {
                let mut evaluator = self.evaluator.lock().expect("evaluator lock poisoned");
                evaluator.evaluate(&definition, message.value, labels)
            };

            let transitioned = match &evaluation {
                Evaluation::Fired(instance) | Evaluation::Resolved(instance) => {
                    Some(instance.clone())
                }
                Evaluation::Pending | Evaluation::Updated | Evaluation::Idle => None,
            };

            self.manager.handle(&definition, evaluation).await;

            if let Some(instance) = transitioned {
                if let Err(err) = self.store.store_alert(&instance).await {
                    tracing::warn!(%err, "alert persistence failed");
                }
                self.broker.broadcast(
                    &message.topic(),
                    &BrokerEvent::Alert { data: instance },
                );
            }
        }
    }

    /// Replace the alert definition set without restarting the pipeline.
    pub fn set_definitions(&self, definitions: Vec<AlertDefinition>) {
        let count = definitions.len();
        *self.definitions.write().expect("definitions lock poisoned") = definitions;
        tracing::info!(count, "alert definitions reloaded");
    }

    pub fn definitions(&self) -> Vec<AlertDefinition> {
        self.definitions
            .read()
            .expect("definitions lock poisoned")
            .clone()
    }

    /// Latest scored readings for one device, keyed by metric type.
    pub fn device_status(&self, device_id: &str) -> Option<BTreeMap<String, LatestReading>> {
        self.latest.get(device_id).map(|entry| entry.clone())
    }

    /// Latest scored readings across all devices.
    pub fn overview(&self) -> BTreeMap<String, BTreeMap<String, LatestReading>> {
        self.latest
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Buffered readings younger than `window`, in arrival order.
    pub fn recent(&self, window: chrono::Duration) -> Vec<StreamMessage> {
        self.buffer.get_recent(window)
    }

    /// Drop buffered readings older than the retention window.
    pub fn flush_older_than(&self, max_age: chrono::Duration) -> usize {
        self.buffer.flush_older_than(max_age)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            anomalies_detected: self.anomalies_detected.load(Ordering::Relaxed),
            buffer: self.buffer.stats(),
            tracked_streams: self.stats.stream_count(),
            active_alerts: self.manager.active_count(),
        }
    }
}
