//! Stream buffering and rolling statistics.
//!
//! Two independent leaves of the ingestion pipeline: a capacity-bounded
//! circular buffer over recent telemetry, and per-(device, metric) rolling
//! mean/stddev windows that feed anomaly scoring.

#![deny(unsafe_code)]

mod buffer;
mod rolling;

pub use buffer::{BufferStats, StreamBuffer};
pub use rolling::RollingStatistics;
