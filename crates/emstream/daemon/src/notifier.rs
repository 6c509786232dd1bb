//! Notification delivery backends.

use crate::config::NotificationConfig;
use async_trait::async_trait;
use emstream_alerts::{LogNotifier, Notifier, NotifyError};
use emstream_types::Severity;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Posts alert notifications to a configured webhook endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    severity: Severity,
    title: &'a str,
    message: &'a str,
    channels: &'a [String],
    sent_at: chrono::DateTime<chrono::Utc>,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;
        Ok(Self {
            client,
            url,
            timeout_secs,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        severity: Severity,
        title: &str,
        message: &str,
        channels: &[String],
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            severity,
            title,
            message,
            channels,
            sent_at: chrono::Utc::now(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    NotifyError::Timeout(self.timeout_secs)
                } else {
                    NotifyError::Delivery(err.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Select the notifier backend from configuration.
pub fn build(config: &NotificationConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.webhook_url {
        Some(url) => {
            tracing::info!(%url, "webhook notifications enabled");
            Ok(Arc::new(WebhookNotifier::new(
                url.clone(),
                config.timeout_secs,
            )?))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}
