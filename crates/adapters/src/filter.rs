//! Predicate gate

use contracts::{async_trait, Context, Event, Sink, SinkError};

/// Skips the inner sink when the predicate returns false.
///
/// A skipped event is a success, not an error.
pub struct Filter<S, P> {
    inner: S,
    predicate: P,
}

impl<S, P> Filter<S, P> {
    pub fn new(inner: S, predicate: P) -> Self {
        Self { inner, predicate }
    }
}

/// Predicate keeping only events that carry `key`
pub fn has_field(
    key: impl Into<String>,
) -> impl Fn(&Context, &Event) -> bool + Send + Sync + 'static {
    let key = key.into();
    move |_ctx, event| event.has_field(&key)
}

#[async_trait]
impl<S, P, E> Sink<E> for Filter<S, P>
where
    S: Sink<E>,
    P: Fn(&Context, &E) -> bool + Send + Sync,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        if !(self.predicate)(ctx, &event) {
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
