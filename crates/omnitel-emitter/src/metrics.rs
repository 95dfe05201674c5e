//! Prometheus metrics registry for Omnitel
//!
//! Counters and gauges for every stage of the pipeline: events entering the
//! emitter, events dropped before it, batch outcomes and delivery latency.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: events accepted into the emitter buffer
    pub events_enqueued_total: IntCounter,
    /// Counter: events with a terminal delivery result, by result
    pub events_delivered_total: IntCounterVec,
    /// Counter: events dropped before delivery, by reason
    pub events_dropped_total: IntCounterVec,
    /// Counter: completed batches by result
    pub batches_total: IntCounterVec,
    /// Gauge: events currently waiting in the buffer
    pub buffered_events: IntGauge,
    /// Histogram: time from dispatch to terminal outcome, in seconds
    pub delivery_duration_seconds: HistogramVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("omnitel".to_string()), None)?;

        let events_enqueued_total = IntCounter::with_opts(Opts::new(
            "events_enqueued_total",
            "Events accepted into the emitter buffer",
        ))?;
        registry.register(Box::new(events_enqueued_total.clone()))?;

        let events_delivered_total = IntCounterVec::new(
            Opts::new("events_delivered_total", "Events with a terminal delivery result"),
            &["result"],
        )?;
        registry.register(Box::new(events_delivered_total.clone()))?;

        let events_dropped_total = IntCounterVec::new(
            Opts::new("events_dropped_total", "Events dropped before delivery"),
            &["reason"],
        )?;
        registry.register(Box::new(events_dropped_total.clone()))?;

        let batches_total = IntCounterVec::new(
            Opts::new("batches_total", "Completed batches by result"),
            &["result"],
        )?;
        registry.register(Box::new(batches_total.clone()))?;

        let buffered_events = IntGauge::with_opts(Opts::new(
            "buffered_events",
            "Events waiting in the emitter buffer",
        ))?;
        registry.register(Box::new(buffered_events.clone()))?;

        let delivery_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "delivery_duration_seconds",
                "Batch delivery duration in seconds, retries included",
            )
            .buckets(vec![0.05, 0.25, 1.0, 5.0, 30.0, f64::INFINITY]),
            &["result"],
        )?;
        registry.register(Box::new(delivery_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            events_enqueued_total,
            events_delivered_total,
            events_dropped_total,
            batches_total,
            buffered_events,
            delivery_duration_seconds,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    pub fn record_enqueued(&self) {
        self.events_enqueued_total.inc();
    }

    /// Record an event dropped before delivery (`consent`, `invalid`, `closed`).
    pub fn record_dropped(&self, reason: &str) {
        self.events_dropped_total.with_label_values(&[reason]).inc();
    }

    /// Record the terminal outcome of one batch.
    pub fn record_batch(&self, result: &str, succeeded: usize, failed: usize, duration_secs: f64) {
        self.batches_total.with_label_values(&[result]).inc();
        self.events_delivered_total
            .with_label_values(&["success"])
            .inc_by(succeeded as u64);
        self.events_delivered_total
            .with_label_values(&["failure"])
            .inc_by(failed as u64);
        self.delivery_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    pub fn set_buffered(&self, count: usize) {
        self.buffered_events.set(count as i64);
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
