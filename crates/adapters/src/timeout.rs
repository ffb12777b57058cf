//! Deadline around a single inner call

use std::sync::Arc;
use std::time::Duration;

use contracts::{async_trait, Context, Sink, SinkError};

/// Used when a zero timeout is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stops waiting for the inner sink after `after`.
///
/// The inner call runs on its own task with a child context that is
/// cancelled when the deadline fires. Inner sinks that ignore cancellation
/// keep running in the background; only the wait ends.
pub struct Timeout<S> {
    inner: Arc<S>,
    after: Duration,
}

impl<S> Timeout<S> {
    pub fn new(inner: S, after: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            after: if after.is_zero() { DEFAULT_TIMEOUT } else { after },
        }
    }

    pub fn after(&self) -> Duration {
        self.after
    }
}

#[async_trait]
impl<S, E> Sink<E> for Timeout<S>
where
    S: Sink<E> + 'static,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        let call_ctx = ctx.with_timeout(self.after);
        let inner = Arc::clone(&self.inner);
        let task_ctx = call_ctx.clone();
        let mut handle = tokio::spawn(async move { inner.process(&task_ctx, event).await });

        tokio::select! {
            joined = &mut handle => match joined {
                Ok(result) => result,
                Err(join_err) => Err(SinkError::handler(
                    self.inner.name(),
                    format!("sink task failed: {join_err}"),
                )),
            },
            _ = tokio::time::sleep(self.after) => {
                call_ctx.cancel();
                tracing::debug!(
                    sink = self.inner.name(),
                    timeout_ms = self.after.as_millis() as u64,
                    "Sink call timed out"
                );
                Err(SinkError::timeout(self.inner.name(), self.after))
            }
            err = ctx.done() => {
                call_ctx.cancel();
                Err(err)
            }
        }
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush().await
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.inner.close().await
    }
}
