//! Builder-style adapter composition

use std::sync::Arc;
use std::time::Duration;

use contracts::{Context, SamplingMode, SharedSink, Sink};

use crate::{
    Batch, BreakerConfig, CircuitBreaker, Detached, Fallback, Filter, Instrumented, RateLimitMode,
    RateLimiter, Retry, Sampling, Timeout,
};

/// `sink.with_x(..)` constructors for every adapter.
///
/// Each call wraps `self`, so the first adapter applied is the innermost.
pub trait SinkExt<E: Send + 'static>: Sink<E> + Sized {
    fn with_retry(self, attempts: u32) -> Retry<Self> {
        Retry::new(self, attempts)
    }

    fn with_backoff(self, attempts: u32, base: Duration) -> Retry<Self> {
        Retry::with_backoff(self, attempts, base)
    }

    fn with_timeout(self, after: Duration) -> Timeout<Self> {
        Timeout::new(self, after)
    }

    fn with_circuit_breaker(self, config: BreakerConfig) -> CircuitBreaker<Self> {
        CircuitBreaker::new(self, config)
    }

    fn with_rate_limit(self, rps: f64, burst: u32, mode: RateLimitMode) -> RateLimiter<Self> {
        RateLimiter::new(self, rps, burst, mode)
    }

    fn with_fallback<F: Sink<E>>(self, secondary: F) -> Fallback<Self, F> {
        Fallback::new(self, secondary)
    }

    /// Fire-and-forget offload
    fn with_async(self) -> Detached<Self> {
        Detached::new(self)
    }

    fn with_filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        P: Fn(&Context, &E) -> bool + Send + Sync,
    {
        Filter::new(self, predicate)
    }

    fn with_sampling(self, rate: f64, mode: SamplingMode) -> Sampling<Self> {
        Sampling::new(self, rate, mode)
    }

    fn with_batch(self, size: usize) -> Batch<Self, E> {
        Batch::new(self, size)
    }

    fn with_metrics(self) -> Instrumented<Self> {
        Instrumented::new(self)
    }

    /// Type-erase for registration with a router
    fn shared(self) -> SharedSink<E>
    where
        Self: 'static,
    {
        Arc::new(self)
    }
}

impl<E: Send + 'static, S: Sink<E>> SinkExt<E> for S {}
