//! Per-sink call metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use contracts::{async_trait, Context, Sink, SinkError};
use observability::metrics::{record_sink_latency_ms, record_sink_outcome, SinkOutcome};
use observability::{RunningStats, StatsSummary};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Calls that returned Ok
    success_count: AtomicU64,
    /// Handler failures
    failure_count: AtomicU64,
    /// Circuit-open / rate-limited
    rejected_count: AtomicU64,
    /// Timeouts and cancellations
    incomplete_count: AtomicU64,
    latency_ms: Mutex<RunningStats>,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    pub fn incomplete_count(&self) -> u64 {
        self.incomplete_count.load(Ordering::Relaxed)
    }

    /// Count one finished call
    pub fn record(&self, outcome: SinkOutcome, latency_ms: f64) {
        let counter = match outcome {
            SinkOutcome::Success => &self.success_count,
            SinkOutcome::Failure => &self.failure_count,
            SinkOutcome::Rejected => &self.rejected_count,
            SinkOutcome::Incomplete => &self.incomplete_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.latency_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(latency_ms);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.latency_ms.lock().unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            success_count: self.success_count(),
            failure_count: self.failure_count(),
            rejected_count: self.rejected_count(),
            incomplete_count: self.incomplete_count(),
            latency_ms: StatsSummary::from(&*latency),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub success_count: u64,
    pub failure_count: u64,
    pub rejected_count: u64,
    pub incomplete_count: u64,
    pub latency_ms: StatsSummary,
}

impl MetricsSnapshot {
    pub fn total(&self) -> u64 {
        self.success_count + self.failure_count + self.rejected_count + self.incomplete_count
    }
}

fn classify(result: &Result<impl Sized, SinkError>) -> SinkOutcome {
    match result {
        Ok(_) => SinkOutcome::Success,
        Err(err) if err.is_rejection() => SinkOutcome::Rejected,
        Err(err) if err.is_incomplete() => SinkOutcome::Incomplete,
        Err(_) => SinkOutcome::Failure,
    }
}

/// Counts outcomes and latency of every call to the inner sink.
///
/// Counts are kept locally (see [`Instrumented::metrics`]) and also sent
/// to the global `metrics` recorder labelled with the sink name.
pub struct Instrumented<S> {
    inner: S,
    metrics: Arc<SinkMetrics>,
}

impl<S> Instrumented<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Shared handle to this sink's counters
    pub fn metrics(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[async_trait]
impl<S, E> Sink<E> for Instrumented<S>
where
    S: Sink<E>,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        let start = Instant::now();
        let result = self.inner.process(ctx, event).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let outcome = classify(&result);
        self.metrics.record(outcome, latency_ms);
        record_sink_outcome(self.inner.name(), outcome);
        record_sink_latency_ms(self.inner.name(), latency_ms);
        result
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush().await
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{event, ScriptedSink};
    use crate::{RateLimitMode, RateLimiter};

    #[tokio::test]
    async fn test_counts_outcomes() {
        let inner = Arc::new(ScriptedSink::new("counted", &[true, false, true], true));
        let sink = Instrumented::new(Arc::clone(&inner));
        let ctx = Context::background();

        for _ in 0..3 {
            let _ = sink.process(&ctx, event()).await;
        }

        let snapshot = sink.metrics().snapshot();
        assert_eq!(snapshot.success_count, 2);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.total(), 3);
        assert_eq!(snapshot.latency_ms.count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_counted_separately() {
        let inner = Arc::new(ScriptedSink::ok("limited"));
        let sink = Instrumented::new(RateLimiter::new(
            Arc::clone(&inner),
            1.0,
            1,
            RateLimitMode::Drop,
        ));
        let ctx = Context::background();

        let _ = sink.process(&ctx, event()).await;
        let _ = sink.process(&ctx, event()).await;

        let snapshot = sink.metrics().snapshot();
        assert_eq!(snapshot.success_count, 1);
        assert_eq!(snapshot.rejected_count, 1);
        assert_eq!(snapshot.failure_count, 0);
    }
}
