//! Scorer trait and the default z-score implementation.

use crate::trend::classify_trend;
use emstream_types::{AnomalyResult, RollingSnapshot, StreamMessage, Trend};
use serde::{Deserialize, Serialize};

/// Unified detector thresholds.
///
/// One configuration owns every detection constant so no component hardcodes
/// a divergent default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Z-score magnitude above which a value is anomalous.
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    /// Minimum window samples before any anomaly judgement is attempted.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Number of trailing values considered for trend classification.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Correlation magnitude required to call a trend.
    #[serde(default = "default_trend_correlation")]
    pub trend_correlation: f64,
}

fn default_z_threshold() -> f64 {
    3.0
}

fn default_min_samples() -> usize {
    10
}

fn default_trend_window() -> usize {
    20
}

fn default_trend_correlation() -> f64 {
    0.7
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            z_threshold: default_z_threshold(),
            min_samples: default_min_samples(),
            trend_window: default_trend_window(),
            trend_correlation: default_trend_correlation(),
        }
    }
}

/// Anomaly scoring strategy.
///
/// Implementations must be pure with respect to their inputs: the same
/// message and snapshot always yield the same result.
pub trait Scorer: Send + Sync {
    fn score(&self, message: &StreamMessage, snapshot: &RollingSnapshot) -> AnomalyResult;
}

/// Default statistical scorer: z-score magnitude against the rolling window.
pub struct ZScoreScorer {
    config: DetectorConfig,
}

impl ZScoreScorer {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Default for ZScoreScorer {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl Scorer for ZScoreScorer {
    fn score(&self, message: &StreamMessage, snapshot: &RollingSnapshot) -> AnomalyResult {
        let (anomaly_score, is_anomaly) =
            if snapshot.sample_count >= self.config.min_samples && snapshot.stddev > 0.0 {
                let z = ((message.value - snapshot.mean) / snapshot.stddev).abs();
                (z, z > self.config.z_threshold)
            } else {
                // Insufficient data: no judgement.
                (0.0, false)
            };

        let trend = if snapshot.tail.len() >= self.config.trend_window {
            classify_trend(
                &snapshot.tail,
                self.config.trend_correlation,
                self.config.trend_window,
            )
        } else {
            Trend::Stable
        };

        AnomalyResult {
            is_anomaly,
            anomaly_score,
            trend,
            mean: snapshot.mean,
            stddev: snapshot.stddev,
            scored_at: chrono::Utc::now(),
        }
    }
}

/// Contract for an external model: given a feature vector, return a score in
/// a bounded range plus a boolean classification.
pub trait FeatureScorer: Send + Sync {
    fn score_features(&self, features: &[f64]) -> (f64, bool);
}

/// Adapts a [`FeatureScorer`] (ensemble, isolation forest, remote service)
/// to the pipeline's [`Scorer`] seam. Feature vector layout:
/// `[value, mean, stddev, z_score]`.
pub struct ExternalScorer<S> {
    model: S,
    config: DetectorConfig,
}

impl<S: FeatureScorer> ExternalScorer<S> {
    pub fn new(model: S, config: DetectorConfig) -> Self {
        Self { model, config }
    }
}

impl<S: FeatureScorer> Scorer for ExternalScorer<S> {
    fn score(&self, message: &StreamMessage, snapshot: &RollingSnapshot) -> AnomalyResult {
        if snapshot.sample_count < self.config.min_samples {
            return AnomalyResult {
                is_anomaly: false,
                anomaly_score: 0.0,
                trend: Trend::Stable,
                mean: snapshot.mean,
                stddev: snapshot.stddev,
                scored_at: chrono::Utc::now(),
            };
        }

        let z = if snapshot.stddev > 0.0 {
            ((message.value - snapshot.mean) / snapshot.stddev).abs()
        } else {
            0.0
        };
        let features = [message.value, snapshot.mean, snapshot.stddev, z];
        let (score, is_anomaly) = self.model.score_features(&features);

        let trend = classify_trend(
            &snapshot.tail,
            self.config.trend_correlation,
            self.config.trend_window,
        );

        AnomalyResult {
            is_anomaly,
            anomaly_score: score,
            trend,
            mean: snapshot.mean,
            stddev: snapshot.stddev,
            scored_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emstream_stream::RollingStatistics;
    use emstream_types::{MetricKey, Quality};
    use std::collections::HashMap;

    fn msg(value: f64) -> StreamMessage {
        StreamMessage {
            timestamp: chrono::Utc::now(),
            device_id: "m1".to_string(),
            metric_type: "voltage".to_string(),
            value,
            unit: "V".to_string(),
            quality: Quality::Good,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn outlier_in_voltage_series_scores_anomalous() {
        let stats = RollingStatistics::new(1000, 20);
        let scorer = ZScoreScorer::default();
        let series = [
            230.0, 231.0, 229.0, 230.0, 232.0, 231.0, 230.0, 229.0, 231.0, 230.0, 500.0, 230.0,
            231.0, 229.0, 230.0,
        ];

        let mut flagged = Vec::new();
        for (i, value) in series.iter().enumerate() {
            let snapshot = stats.update(MetricKey::new("m1", "voltage"), *value);
            let result = scorer.score(&msg(*value), &snapshot);
            if result.is_anomaly {
                flagged.push((i, result.anomaly_score));
            }
        }

        // The 11th insert (index 10, value 500) must be flagged with z > 3.
        assert!(flagged.iter().any(|(i, _)| *i == 10));
        let (_, score) = flagged.iter().find(|(i, _)| *i == 10).unwrap();
        assert!(*score > 3.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let scorer = ZScoreScorer::default();
        let snapshot = RollingSnapshot {
            mean: 230.0,
            stddev: 2.0,
            sample_count: 100,
            tail: vec![230.0; 20],
            last_update: chrono::Utc::now(),
        };
        let message = msg(240.0);

        let a = scorer.score(&message, &snapshot);
        let b = scorer.score(&message, &snapshot);
        assert_eq!(a.is_anomaly, b.is_anomaly);
        assert_eq!(a.anomaly_score, b.anomaly_score);
        assert_eq!(a.trend, b.trend);
        assert!(a.is_anomaly);
        assert!((a.anomaly_score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn insufficient_data_yields_no_judgement() {
        let scorer = ZScoreScorer::default();
        let snapshot = RollingSnapshot {
            mean: 100.0,
            stddev: 0.0,
            sample_count: 5,
            tail: vec![100.0; 5],
            last_update: chrono::Utc::now(),
        };
        let result = scorer.score(&msg(10_000.0), &snapshot);
        assert!(!result.is_anomaly);
        assert_eq!(result.anomaly_score, 0.0);
    }

    #[test]
    fn trend_reported_from_tail() {
        let scorer = ZScoreScorer::default();
        let snapshot = RollingSnapshot {
            mean: 120.0,
            stddev: 15.0,
            sample_count: 50,
            tail: (0..20).map(|i| 100.0 + i as f64 * 2.0).collect(),
            last_update: chrono::Utc::now(),
        };
        let result = scorer.score(&msg(138.0), &snapshot);
        assert_eq!(result.trend, Trend::Increasing);
    }

    struct FixedModel {
        score: f64,
        flag: bool,
    }

    impl FeatureScorer for FixedModel {
        fn score_features(&self, features: &[f64]) -> (f64, bool) {
            assert_eq!(features.len(), 4);
            (self.score, self.flag)
        }
    }

    #[test]
    fn external_model_substitutes_for_statistical_scorer() {
        let scorer = ExternalScorer::new(
            FixedModel {
                score: 0.92,
                flag: true,
            },
            DetectorConfig::default(),
        );
        let snapshot = RollingSnapshot {
            mean: 230.0,
            stddev: 1.0,
            sample_count: 100,
            tail: vec![230.0; 20],
            last_update: chrono::Utc::now(),
        };
        let result = scorer.score(&msg(230.5), &snapshot);
        assert!(result.is_anomaly);
        assert!((result.anomaly_score - 0.92).abs() < 1e-9);
    }
}
