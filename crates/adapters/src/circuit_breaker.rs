//! Circuit breaker around a sink.
//!
//! Closed counts consecutive failures and opens at `failure_threshold`.
//! Open rejects every call without touching the inner sink until
//! `reset_timeout` has elapsed, then admits a single probe (Half-Open).
//! `success_threshold` consecutive probe successes close the circuit; any
//! probe failure reopens it.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{async_trait, Context, Sink, SinkError};
use observability::metrics::record_circuit_state;
use tokio::time::Instant;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through, failures are counted
    Closed = 0,
    /// Calls are rejected without invoking the inner sink
    Open = 1,
    /// One probe call at a time decides whether to close again
    HalfOpen = 2,
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Consecutive probe successes before closing it again
    pub success_threshold: u32,
    /// Time spent open before the first probe
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Sink wrapper that stops calling a failing sink for a while.
pub struct CircuitBreaker<S> {
    inner: S,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

/// Releases the probe slot if the probing call is dropped before it
/// reports an outcome.
struct ProbeGuard<'a, S> {
    breaker: &'a CircuitBreaker<S>,
    armed: bool,
}

impl<S> Drop for ProbeGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}

impl<S> CircuitBreaker<S> {
    /// Zero thresholds clamp to 1
    pub fn new(inner: S, config: BreakerConfig) -> Self {
        let config = BreakerConfig {
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            reset_timeout: config.reset_timeout,
        };
        Self {
            inner,
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Get the current circuit state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Ok(true)` admits a probe, `Ok(false)` a normal closed-state call.
    fn admit(&self, sink_name: &str) -> Result<bool, SinkError> {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let elapsed = guard
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.config.reset_timeout && !guard.probe_in_flight {
                    guard.state = CircuitState::HalfOpen;
                    guard.consecutive_successes = 0;
                    guard.probe_in_flight = true;
                    drop(guard);
                    self.transitioned(sink_name, CircuitState::HalfOpen);
                    Ok(true)
                } else {
                    Err(SinkError::CircuitOpen {
                        sink_name: sink_name.to_string(),
                    })
                }
            }
            CircuitState::HalfOpen if !guard.probe_in_flight => {
                guard.probe_in_flight = true;
                Ok(true)
            }
            CircuitState::HalfOpen => Err(SinkError::CircuitOpen {
                sink_name: sink_name.to_string(),
            }),
        }
    }

    fn record_success(&self, sink_name: &str) {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => guard.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                guard.probe_in_flight = false;
                guard.consecutive_successes += 1;
                if guard.consecutive_successes >= self.config.success_threshold {
                    guard.state = CircuitState::Closed;
                    guard.consecutive_failures = 0;
                    guard.consecutive_successes = 0;
                    guard.opened_at = None;
                    drop(guard);
                    self.transitioned(sink_name, CircuitState::Closed);
                }
            }
            // A closed-state call that finished after the circuit opened
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self, sink_name: &str) {
        let mut guard = self.lock();
        match guard.state {
            CircuitState::Closed => {
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.config.failure_threshold {
                    guard.state = CircuitState::Open;
                    guard.opened_at = Some(Instant::now());
                    drop(guard);
                    self.transitioned(sink_name, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                guard.state = CircuitState::Open;
                guard.opened_at = Some(Instant::now());
                guard.consecutive_successes = 0;
                guard.probe_in_flight = false;
                drop(guard);
                self.transitioned(sink_name, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn transitioned(&self, sink_name: &str, to: CircuitState) {
        record_circuit_state(sink_name, to as u8);
        match to {
            CircuitState::Open => tracing::warn!(sink = sink_name, "Circuit opened"),
            CircuitState::HalfOpen => tracing::info!(sink = sink_name, "Circuit half-open, probing"),
            CircuitState::Closed => tracing::info!(sink = sink_name, "Circuit closed"),
        }
    }
}

#[async_trait]
impl<S, E> Sink<E> for CircuitBreaker<S>
where
    S: Sink<E>,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        let probe = self.admit(self.inner.name())?;
        let mut guard = ProbeGuard {
            breaker: self,
            armed: probe,
        };

        let result = self.inner.process(ctx, event).await;
        guard.armed = false;

        match &result {
            Ok(_) => self.record_success(self.inner.name()),
            // The caller gave up; says nothing about the sink's health
            Err(SinkError::Cancelled) => {
                if probe {
                    self.lock().probe_in_flight = false;
                }
            }
            Err(_) => self.record_failure(self.inner.name()),
        }
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
    use std::sync::Arc;

    fn config(failures: u32, successes: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: failures,
            success_threshold: successes,
            reset_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_short_circuits() {
        let inner = Arc::new(ScriptedSink::failing("down"));
        let sink = CircuitBreaker::new(Arc::clone(&inner), config(3, 1));
        let ctx = Context::background();

        for _ in 0..3 {
            assert!(sink.process(&ctx, event()).await.is_err());
        }
        assert_eq!(sink.state(), CircuitState::Open);
        assert_eq!(inner.calls(), 3);

        let result = sink.process(&ctx, event()).await;
        match result {
            Err(err @ SinkError::CircuitOpen { .. }) => assert!(err.is_rejection()),
            other => panic!("expected circuit open, got {other:?}"),
        }
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_closes_after_successes() {
        let inner = Arc::new(ScriptedSink::new("flaky", &[false, false, false], true));
        let sink = CircuitBreaker::new(Arc::clone(&inner), config(3, 2));
        let ctx = Context::background();

        for _ in 0..3 {
            let _ = sink.process(&ctx, event()).await;
        }
        assert_eq!(sink.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(sink.process(&ctx, event()).await.is_ok());
        assert_eq!(sink.state(), CircuitState::HalfOpen);
        assert!(sink.process(&ctx, event()).await.is_ok());
        assert_eq!(sink.state(), CircuitState::Closed);
        assert_eq!(inner.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens() {
        let inner = Arc::new(ScriptedSink::failing("down"));
        let sink = CircuitBreaker::new(Arc::clone(&inner), config(1, 1));
        let ctx = Context::background();

        let _ = sink.process(&ctx, event()).await;
        assert_eq!(sink.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(
            sink.process(&ctx, event()).await,
            Err(SinkError::Handler { .. })
        ));
        assert_eq!(sink.state(), CircuitState::Open);
        assert_eq!(inner.calls(), 2);

        // Fresh reset window after reopening
        assert!(matches!(
            sink.process(&ctx, event()).await,
            Err(SinkError::CircuitOpen { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_probe_in_flight() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let release = Arc::clone(&gate);
        let sink = Arc::new(CircuitBreaker::new(
            contracts::sink_fn("gated", move |_ctx: Context, event: contracts::Event| {
                let gate = Arc::clone(&gate);
                async move {
                    if event.has_field("fail") {
                        return Err(SinkError::handler("gated", "boom"));
                    }
                    gate.notified().await;
                    Ok(event)
                }
            }),
            config(1, 1),
        ));
        let ctx = Context::background();

        let failing = contracts::Event::new("TEST", "x", contracts::fields!["fail" => true]);
        let _ = sink.process(&ctx, failing).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        let probe_sink = Arc::clone(&sink);
        let probe = tokio::spawn(async move {
            probe_sink
                .process(&Context::background(), event())
                .await
                .is_ok()
        });
        tokio::task::yield_now().await;
        assert_eq!(sink.state(), CircuitState::HalfOpen);

        assert!(matches!(
            sink.process(&ctx, event()).await,
            Err(SinkError::CircuitOpen { .. })
        ));

        release.notify_one();
        assert!(probe.await.unwrap());
        assert_eq!(sink.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let inner = Arc::new(ScriptedSink::new("flaky", &[false, false, true, false], true));
        let sink = CircuitBreaker::new(Arc::clone(&inner), config(3, 1));
        let ctx = Context::background();

        for _ in 0..4 {
            let _ = sink.process(&ctx, event()).await;
        }

        assert_eq!(sink.state(), CircuitState::Closed);
        assert_eq!(sink.consecutive_failures(), 1);
    }

    #[test]
    fn test_zero_thresholds_clamp() {
        let sink = CircuitBreaker::new((), config(0, 0));
        assert_eq!(sink.config().failure_threshold, 1);
        assert_eq!(sink.config().success_threshold, 1);
    }
}
