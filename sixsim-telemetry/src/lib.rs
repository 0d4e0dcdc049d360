//! # sixsim Telemetry
//!
//! Crate for logging and metrics of a simulation run.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
