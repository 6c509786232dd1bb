//! Structural validation applied before a reading enters the pipeline.

use emstream_types::StreamMessage;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("device_id must not be empty")]
    EmptyDeviceId,
    #[error("metric_type must not be empty")]
    EmptyMetricType,
    #[error("value must be finite, got {0}")]
    NonFiniteValue(f64),
}

/// Reject messages that cannot be safely buffered or scored.
pub fn validate(message: &StreamMessage) -> Result<(), ValidationError> {
    if message.device_id.trim().is_empty() {
        return Err(ValidationError::EmptyDeviceId);
    }
    if message.metric_type.trim().is_empty() {
        return Err(ValidationError::EmptyMetricType);
    }
    if !message.value.is_finite() {
        return Err(ValidationError::NonFiniteValue(message.value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(device_id: &str, metric_type: &str, value: f64) -> StreamMessage {
        StreamMessage {
            timestamp: Utc::now(),
            device_id: device_id.to_string(),
            metric_type: metric_type.to_string(),
            value,
            unit: String::new(),
            quality: Default::default(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn accepts_well_formed_message() {
        assert_eq!(validate(&message("meter-1", "voltage", 230.0)), Ok(()));
    }

    #[test]
    fn rejects_blank_identifiers() {
        assert_eq!(
            validate(&message("  ", "voltage", 230.0)),
            Err(ValidationError::EmptyDeviceId)
        );
        assert_eq!(
            validate(&message("meter-1", "", 230.0)),
            Err(ValidationError::EmptyMetricType)
        );
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(validate(&message("meter-1", "voltage", f64::NAN)).is_err());
        assert!(validate(&message("meter-1", "voltage", f64::INFINITY)).is_err());
    }
}
