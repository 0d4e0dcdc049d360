//! ## sixsim-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! The engine only emits `tracing` events; installing a subscriber is left to
//! the binary. Simulation-level records (start, pause, end) go through
//! [`EventLogger::log_event`] so they share one span name and carry the ASN.

use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
    pub fn init(default_level: &str) {
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::NONE)
            .try_init();
    }

    /// Records a simulation-level event at `asn`.
    #[inline]
    pub fn log_event(event_type: &str, asn: u64, metadata: &[(&str, String)]) {
        let span = info_span!("sim_event", event_type = event_type, asn = asn);
        let _entered = span.enter();
        tracing::info!(metadata = ?metadata, "Simulation event occurred");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_logging() {
        EventLogger::log_event("pause", 12, &[("reason", "test".to_string())]);
        assert!(logs_contain("Simulation event occurred"));
        assert!(logs_contain("pause"));
    }
}
