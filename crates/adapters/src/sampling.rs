//! Event sampling

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{async_trait, Context, SamplingMode, Sink, SinkError};

/// Forwards a fraction of events; the rest succeed without a call.
///
/// Deterministic mode forwards every `round(1/rate)`-th event, so the same
/// input sequence always yields the same output. Random mode draws once per
/// event.
pub struct Sampling<S> {
    inner: S,
    rate: f64,
    mode: SamplingMode,
    every: u64,
    seen: AtomicU64,
}

impl<S> Sampling<S> {
    /// `rate` is clamped to `[0, 1]`; NaN counts as 0
    pub fn new(inner: S, rate: f64, mode: SamplingMode) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        let every = if rate > 0.0 {
            (1.0 / rate).round().max(1.0) as u64
        } else {
            0
        };
        Self {
            inner,
            rate,
            mode,
            every,
            seen: AtomicU64::new(0),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    fn sampled(&self) -> bool {
        match self.mode {
            SamplingMode::Deterministic => {
                if self.every == 0 {
                    return false;
                }
                let count = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
                count % self.every == 0
            }
            SamplingMode::Random => rand::random::<f64>() < self.rate,
        }
    }
}

#[async_trait]
impl<S, E> Sink<E> for Sampling<S>
where
    S: Sink<E>,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        if !self.sampled() {
            return Ok(event);
        }
        self.inner.process(ctx, event).await
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush().await
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.inner.close().await
    }
}
