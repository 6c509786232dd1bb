//! Core types for the EMStream telemetry pipeline.
//!
//! Shared data model for telemetry messages, anomaly scoring output, and the
//! alerting state machine. Everything here is plain data: behavior lives in
//! the component crates.

#![deny(unsafe_code)]

pub mod alert;
pub mod anomaly;
pub mod message;

pub use alert::{
    AlertDefinition, AlertInstance, AlertState, Comparison, EscalationRule, Severity,
};
pub use anomaly::{AnomalyRecord, AnomalyResult, RollingSnapshot, Trend};
pub use message::{MetricKey, Quality, StreamMessage};
