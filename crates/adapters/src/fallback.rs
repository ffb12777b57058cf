//! Primary/secondary failover

use contracts::{async_trait, Context, Sink, SinkError};

/// Tries `primary`; on any error hands the same event to `secondary` and
/// returns its outcome.
///
/// Chains nest: `a.with_fallback(b.with_fallback(c))` tries a, b, then c.
pub struct Fallback<P, F> {
    primary: P,
    secondary: F,
}

impl<P, F> Fallback<P, F> {
    pub fn new(primary: P, secondary: F) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl<P, F, E> Sink<E> for Fallback<P, F>
where
    P: Sink<E>,
    F: Sink<E>,
    E: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        match self.primary.process(ctx, event.clone()).await {
            Ok(out) => Ok(out),
            Err(err) => {
                tracing::debug!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %err,
                    "Primary sink failed, using fallback"
                );
                self.secondary.process(ctx, event).await
            }
        }
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let primary = self.primary.flush().await;
        let secondary = self.secondary.flush().await;
        primary.and(secondary)
    }

    async fn close(&self) -> Result<(), SinkError> {
        let primary = self.primary.close().await;
        let secondary = self.secondary.close().await;
        primary.and(secondary)
    }
}
