//! Retry and exponential backoff

use std::time::Duration;

use contracts::{async_trait, Context, Sink, SinkError};

/// Base delay used when backoff is configured with a zero base
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Re-invokes the inner sink until it succeeds or the attempts run out.
///
/// With a base delay the wait before attempt `k + 1` is `base * 2^(k-1)`.
/// Waiting selects on the caller's context, so cancellation ends the loop
/// without sleeping out the delay.
pub struct Retry<S> {
    inner: S,
    attempts: u32,
    base_delay: Option<Duration>,
}

impl<S> Retry<S> {
    /// Immediate retries; `attempts == 0` clamps to 1
    pub fn new(inner: S, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            base_delay: None,
        }
    }

    /// Exponential backoff between attempts
    pub fn with_backoff(inner: S, attempts: u32, base: Duration) -> Self {
        let base = if base.is_zero() {
            DEFAULT_BACKOFF_BASE
        } else {
            base
        };
        Self {
            inner,
            attempts: attempts.max(1),
            base_delay: Some(base),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn base_delay(&self) -> Option<Duration> {
        self.base_delay
    }
}

/// `base * 2^(failed - 1)`, saturating instead of overflowing
fn backoff_delay(base: Duration, failed: u32) -> Duration {
    let exponent = failed.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent)
}

#[async_trait]
impl<S, E> Sink<E> for Retry<S>
where
    S: Sink<E>,
    E: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        let mut attempt = 1;
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            match self.inner.process(ctx, event.clone()).await {
                Ok(out) => return Ok(out),
                Err(err) if attempt >= self.attempts => return Err(err),
                Err(err) => {
                    tracing::debug!(
                        sink = self.inner.name(),
                        attempt,
                        max_attempts = self.attempts,
                        error = %err,
                        "Sink attempt failed, retrying"
                    );
                }
            }

            if let Some(base) = self.base_delay {
                let delay = backoff_delay(base, attempt);
                tokio::select! {
                    err = ctx.done() => return Err(err),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            attempt += 1;
        }
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush().await
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.inner.close().await
    }
}
