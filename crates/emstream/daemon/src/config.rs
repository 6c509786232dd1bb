//! Configuration for emstream-daemon

use emstream_detect::DetectorConfig;
use emstream_types::{AlertDefinition, Comparison, Severity};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Stream buffering and retention
    #[serde(default)]
    pub stream: StreamConfig,

    /// Anomaly detector tuning
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Alerting configuration
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Fan-out configuration
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Notification delivery
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".parse().unwrap(),
            enable_cors: true,
        }
    }
}

/// Stream buffer and retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Raw message buffer capacity
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Per-metric rolling window size
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Trailing values retained for trend classification
    #[serde(default = "default_tail_size")]
    pub tail_size: usize,

    /// Age after which buffered messages are flushed
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Interval between retention passes
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            window_size: default_window_size(),
            tail_size: default_tail_size(),
            retention_secs: default_retention_secs(),
            flush_interval_secs: default_flush_interval(),
        }
    }
}

/// Alerting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Resolved alert history capacity
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Alert definitions evaluated against every reading
    #[serde(default = "default_definitions")]
    pub definitions: Vec<AlertDefinition>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            definitions: default_definitions(),
        }
    }
}

/// Fan-out configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Per-connection channel depth before a subscriber is dropped
    #[serde(default = "default_channel_depth")]
    pub channel_depth: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            channel_depth: default_channel_depth(),
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    /// Webhook endpoint; log-only delivery when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_buffer_capacity() -> usize {
    10_000
}

fn default_window_size() -> usize {
    1_000
}

fn default_tail_size() -> usize {
    20
}

fn default_retention_secs() -> u64 {
    3_600
}

fn default_flush_interval() -> u64 {
    60
}

fn default_history_capacity() -> usize {
    10_000
}

fn default_channel_depth() -> usize {
    256
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Built-in energy-meter thresholds, active until overridden.
fn default_definitions() -> Vec<AlertDefinition> {
    fn definition(
        alert_id: &str,
        name: &str,
        description: &str,
        severity: Severity,
        condition: &str,
        threshold: f64,
        comparison: Comparison,
    ) -> AlertDefinition {
        AlertDefinition {
            alert_id: alert_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            severity,
            condition: condition.to_string(),
            threshold,
            comparison,
            duration_secs: 0,
            evaluation_interval_secs: 30,
            escalation_rules: Vec::new(),
            notification_channels: vec!["log".to_string()],
            tags: Default::default(),
        }
    }

    vec![
        definition(
            "voltage_high",
            "High Voltage",
            "Voltage exceeds safe operating limit",
            Severity::Warning,
            "voltage",
            240.0,
            Comparison::GreaterThan,
        ),
        definition(
            "voltage_low",
            "Low Voltage",
            "Voltage below safe operating limit",
            Severity::Warning,
            "voltage",
            210.0,
            Comparison::LessThan,
        ),
        definition(
            "current_high",
            "High Current",
            "Current draw exceeds rated capacity",
            Severity::Critical,
            "current",
            20.0,
            Comparison::GreaterThan,
        ),
        definition(
            "power_factor_low",
            "Low Power Factor",
            "Power factor below efficiency threshold",
            Severity::Warning,
            "power_factor",
            0.85,
            Comparison::LessThan,
        ),
        definition(
            "temperature_high",
            "High Temperature",
            "Meter temperature exceeds thermal limit",
            Severity::Critical,
            "temperature",
            60.0,
            Comparison::GreaterThan,
        ),
    ]
}

impl DaemonConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with EMSTREAM_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("EMSTREAM")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.stream.buffer_capacity, 10_000);
        assert_eq!(config.stream.window_size, 1_000);
        assert!(config.notifications.webhook_url.is_none());
    }

    #[test]
    fn test_default_definitions_cover_core_metrics() {
        let config = AlertConfig::default();
        let ids: Vec<&str> = config
            .definitions
            .iter()
            .map(|d| d.alert_id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "voltage_high",
                "voltage_low",
                "current_high",
                "power_factor_low",
                "temperature_high"
            ]
        );
        assert!(config
            .definitions
            .iter()
            .all(|d| d.duration_secs == 0 && !d.notification_channels.is_empty()));
    }

    #[test]
    fn test_detector_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.detector.z_threshold, 3.0);
        assert_eq!(config.detector.min_samples, 10);
    }
}
