//! Alert evaluation and lifecycle management.
//!
//! [`AlertEvaluator`] turns threshold breaches into typed state transitions;
//! [`AlertManager`] owns the active-instance set, drives notifications
//! through the [`Notifier`] seam, and runs per-instance escalation tasks
//! with race-free cancellation.

#![deny(unsafe_code)]

mod evaluator;
mod manager;
mod notify;

pub use evaluator::{AlertEvaluator, Evaluation};
pub use manager::{escalation_ladder, AlertError, AlertManager};
pub use notify::{LogNotifier, Notifier, NotifyError};
