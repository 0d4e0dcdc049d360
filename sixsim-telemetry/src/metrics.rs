//! ## sixsim-telemetry::metrics
//! **Prometheus counters for the run loop**
//!
//! Each recorder owns its own registry, so several engines in one process
//! (tests, mostly) never collide on metric names.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub events_dispatched: IntCounter,
    pub batches: IntCounter,
    pub events_cancelled: IntCounter,
    pub pending_events: IntGauge,
    pub batch_size: Histogram,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::try_new().expect("metric names and buckets are static and valid")
    }

    fn try_new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_dispatched =
            IntCounter::new("sixsim_events_dispatched_total", "Events invoked by the run loop")?;
        let batches = IntCounter::new("sixsim_batches_total", "Distinct ASNs dispatched")?;
        let events_cancelled = IntCounter::new(
            "sixsim_events_cancelled_total",
            "Pending events removed by tag",
        )?;
        let pending_events = IntGauge::new("sixsim_pending_events", "Events waiting in the queue")?;
        let batch_size = Histogram::with_opts(
            HistogramOpts::new("sixsim_batch_size", "Events dispatched per ASN")
                .buckets(vec![1.0, 2.0, 4.0, 8.0, 16.0, 64.0, 256.0]),
        )?;

        registry.register(Box::new(events_dispatched.clone()))?;
        registry.register(Box::new(batches.clone()))?;
        registry.register(Box::new(events_cancelled.clone()))?;
        registry.register(Box::new(pending_events.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;

        Ok(Self {
            registry,
            events_dispatched,
            batches,
            events_cancelled,
            pending_events,
            batch_size,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Records one finished batch of `size` events.
    pub fn record_batch(&self, size: usize) {
        self.batches.inc();
        self.events_dispatched.inc_by(size as u64);
        self.batch_size.observe(size as f64);
    }

    pub fn record_cancelled(&self, count: usize) {
        self.events_cancelled.inc_by(count as u64);
    }

    pub fn set_pending(&self, pending: usize) {
        self.pending_events.set(pending as i64);
    }
}
