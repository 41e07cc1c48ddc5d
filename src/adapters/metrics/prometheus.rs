//! Prometheus Metrics Registry - Execution Observability
//!
//! Registers the executor's Prometheus metrics and renders them in
//! text exposition format for the `/metrics` route. Covers transition
//! outcomes, reprice churn and transition latency.

use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::domain::trade::{TransitionOutcome, TransitionResult};

/// Centralized Prometheus metrics for the executor.
///
/// All metrics follow the naming convention `postonly_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Finished transitions by outcome (done, failed, busy).
    pub transitions: IntCounterVec,
    /// Cancel-and-replace cycles by symbol.
    pub reprices: IntCounterVec,
    /// Wall time of admitted transitions.
    pub transition_seconds: Histogram,
    /// Transitions currently holding a lease.
    pub active_transitions: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions = IntCounterVec::new(
            Opts::new("postonly_transitions_total", "Finished position transitions"),
            &["outcome"],
        )?;

        let reprices = IntCounterVec::new(
            Opts::new("postonly_reprices_total", "Post-only cancel-and-replace cycles"),
            &["symbol"],
        )?;

        let transition_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "postonly_transition_seconds",
                "Wall time from admission to terminal state",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0]),
        )?;

        let active_transitions = IntGauge::new(
            "postonly_active_transitions",
            "Transitions currently in flight",
        )?;

        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(reprices.clone()))?;
        registry.register(Box::new(transition_seconds.clone()))?;
        registry.register(Box::new(active_transitions.clone()))?;

        Ok(Self {
            registry,
            transitions,
            reprices,
            transition_seconds,
            active_transitions,
        })
    }

    /// Record one finished transition. BUSY results carry no latency.
    pub fn record(&self, result: &TransitionResult, elapsed: Duration) {
        let outcome = match result.outcome {
            TransitionOutcome::Done => "done",
            TransitionOutcome::Failed => "failed",
            TransitionOutcome::Busy => "busy",
        };
        self.transitions.with_label_values(&[outcome]).inc();

        if result.outcome != TransitionOutcome::Busy {
            self.transition_seconds.observe(elapsed.as_secs_f64());
        }
        if result.reprices > 0 {
            self.reprices
                .with_label_values(&[result.symbol.as_str()])
                .inc_by(u64::from(result.reprices));
        }
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::PositionSide;

    #[test]
    fn test_record_and_render() {
        let metrics = MetricsRegistry::new().unwrap();

        let mut result = TransitionResult::busy("ETHUSDT", PositionSide::Long);
        metrics.record(&result, Duration::ZERO);

        result.outcome = TransitionOutcome::Done;
        result.reprices = 3;
        metrics.record(&result, Duration::from_millis(1500));

        assert_eq!(metrics.transitions.with_label_values(&["busy"]).get(), 1);
        assert_eq!(metrics.transitions.with_label_values(&["done"]).get(), 1);
        assert_eq!(metrics.reprices.with_label_values(&["ETHUSDT"]).get(), 3);
        assert_eq!(metrics.transition_seconds.get_sample_count(), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("postonly_transitions_total"));
        assert!(text.contains("postonly_transition_seconds_bucket"));
    }
}
