//! Buffered batch forwarding

use contracts::{async_trait, Context, Sink, SinkError};
use tokio::sync::Mutex;

/// Buffers events and forwards them in arrival order once `size` are
/// queued, or on `flush`/`close`.
///
/// A buffering call succeeds immediately. The call that fills the batch
/// drains it and returns the first inner error; the rest of the batch is
/// still attempted.
pub struct Batch<S, E> {
    inner: S,
    size: usize,
    buffer: Mutex<Vec<E>>,
}

impl<S, E> Batch<S, E> {
    /// `size == 0` clamps to 1
    pub fn new(inner: S, size: usize) -> Self {
        let size = size.max(1);
        Self {
            inner,
            size,
            buffer: Mutex::new(Vec::with_capacity(size)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }
}

impl<S, E> Batch<S, E>
where
    S: Sink<E>,
    E: Send + 'static,
{
    /// Forward everything in `buffer`; the lock is held so drains never
    /// interleave.
    async fn drain(&self, ctx: &Context, buffer: &mut Vec<E>) -> Result<(), SinkError> {
        let mut first_err = None;
        for event in buffer.drain(..) {
            if let Err(err) = self.inner.process(ctx, event).await {
                tracing::debug!(sink = self.inner.name(), error = %err, "Batched event failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl<S, E> Sink<E> for Batch<S, E>
where
    S: Sink<E>,
    E: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        let mut buffer = self.buffer.lock().await;
        buffer.push(event.clone());
        if buffer.len() >= self.size {
            self.drain(ctx, &mut buffer).await?;
        }
        Ok(event)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut buffer = self.buffer.lock().await;
        let drained = self.drain(&Context::background(), &mut buffer).await;
        drop(buffer);
        drained.and(self.inner.flush().await)
    }

    async fn close(&self) -> Result<(), SinkError> {
        let flushed = self.flush().await;
        flushed.and(self.inner.close().await)
    }
}
