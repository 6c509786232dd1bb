//! Notification delivery seam.

use async_trait::async_trait;
use emstream_types::Severity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("delivery timed out after {0}s")]
    Timeout(u64),
}

/// Outbound notification channel consumed by the alert manager.
///
/// Delivery is best-effort: a failed send is logged by the caller and never
/// blocks an alert state transition. Concrete channels (email, Slack,
/// webhook) live outside the core.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        channels: &[String],
    ) -> Result<(), NotifyError>;
}

/// Notifier that writes to the tracing log. Default when no external
/// channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        channels: &[String],
    ) -> Result<(), NotifyError> {
        match severity {
            Severity::Critical => {
                tracing::error!(%severity, title, message, ?channels, "alert notification")
            }
            Severity::Warning => {
                tracing::warn!(%severity, title, message, ?channels, "alert notification")
            }
            Severity::Info => {
                tracing::info!(%severity, title, message, ?channels, "alert notification")
            }
        }
        Ok(())
    }
}
