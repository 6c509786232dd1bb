//! Anomaly scoring output and rolling-statistic snapshots.

use crate::message::StreamMessage;
use serde::{Deserialize, Serialize};

/// Direction of the recent value trend for a stream.
///
/// Advisory metadata only; never part of the alert-firing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

/// Snapshot of the rolling statistics for one (device, metric) stream,
/// taken at update time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingSnapshot {
    /// Mean over the current window contents.
    pub mean: f64,

    /// Population standard deviation over the current window contents.
    /// Defined as 0.0 while the window holds fewer samples than the
    /// configured minimum.
    pub stddev: f64,

    /// Number of samples currently in the window.
    pub sample_count: usize,

    /// Most recent window values, newest last. Bounded by the trend window
    /// size; used for trend classification only.
    pub tail: Vec<f64>,

    /// Timestamp of the last update to this stream.
    pub last_update: chrono::DateTime<chrono::Utc>,
}

/// Scoring output attached to a message.
///
/// Derived deterministically from a [`RollingSnapshot`] at scoring time and
/// never persisted independently of its message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Whether the value crossed the configured z-score threshold.
    pub is_anomaly: bool,

    /// Z-score magnitude of the value against the rolling window.
    pub anomaly_score: f64,

    /// Recent trend classification for the stream.
    pub trend: Trend,

    /// Rolling mean at scoring time.
    pub mean: f64,

    /// Rolling population standard deviation at scoring time.
    pub stddev: f64,

    /// When the score was computed.
    pub scored_at: chrono::DateTime<chrono::Utc>,
}

/// A persisted anomaly: the offending message together with its analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub message: StreamMessage,
    pub analysis: AnomalyResult,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

impl AnomalyRecord {
    pub fn new(message: StreamMessage, analysis: AnomalyResult) -> Self {
        Self {
            message,
            analysis,
            stored_at: chrono::Utc::now(),
        }
    }
}
