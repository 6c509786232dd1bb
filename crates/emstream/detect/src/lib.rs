//! Anomaly scoring for telemetry streams.
//!
//! The [`Scorer`] trait is the substitution seam: the default
//! [`ZScoreScorer`] scores against rolling statistics, and any external
//! model can be slotted in through [`FeatureScorer`] without touching
//! callers.

#![deny(unsafe_code)]

mod scorer;
mod trend;

pub use scorer::{DetectorConfig, ExternalScorer, FeatureScorer, Scorer, ZScoreScorer};
pub use trend::classify_trend;
