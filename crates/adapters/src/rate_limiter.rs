//! Token bucket rate limiting

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{async_trait, Context, Sink, SinkError};
use observability::metrics::record_rate_limited;
use tokio::time::Instant;

/// What a call does when the bucket is empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitMode {
    /// Fail immediately with [`SinkError::RateLimited`]
    #[default]
    Drop,
    /// Wait (cancellably) for the next token
    Wait,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Refills at `rps` tokens per second up to `burst`. Starts full.
pub struct RateLimiter<S> {
    inner: S,
    rps: f64,
    burst: f64,
    mode: RateLimitMode,
    bucket: Mutex<Bucket>,
}

impl<S> RateLimiter<S> {
    /// Non-positive or non-finite `rps` falls back to 1.0; `burst == 0` to 1
    pub fn new(inner: S, rps: f64, burst: u32, mode: RateLimitMode) -> Self {
        let rps = if rps.is_finite() && rps > 0.0 { rps } else { 1.0 };
        let burst = f64::from(burst.max(1));
        Self {
            inner,
            rps,
            burst,
            mode,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn mode(&self) -> RateLimitMode {
        self.mode
    }

    /// Take a token, or report how long until one is available.
    fn try_acquire(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rps).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - bucket.tokens) / self.rps))
        }
    }
}

#[async_trait]
impl<S, E> Sink<E> for RateLimiter<S>
where
    S: Sink<E>,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        loop {
            match self.try_acquire() {
                Ok(()) => break,
                Err(_) if self.mode == RateLimitMode::Drop => {
                    record_rate_limited(self.inner.name());
                    return Err(SinkError::RateLimited {
                        sink_name: self.inner.name().to_string(),
                    });
                }
                Err(wait) => {
                    tokio::select! {
                        err = ctx.done() => return Err(err),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
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
