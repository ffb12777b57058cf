//! Sink trait - event processing interface
//!
//! Defines the abstract interface for sinks. Terminal sinks perform I/O;
//! adapters wrap another sink and implement the same trait, so stacks
//! compose in any order.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{Context, Event, SinkError};

/// Event processing unit
///
/// Implementations registered for parallel delivery are called
/// concurrently and must not keep references into the event past the call.
#[async_trait]
pub trait Sink<E: Send + 'static = Event>: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Process one event
    ///
    /// # Errors
    /// Returns the handler or policy error (should include the sink name)
    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError>;

    /// Flush buffered events (if any)
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release resources
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Type-erased sink shared between routes
pub type SharedSink<E = Event> = Arc<dyn Sink<E>>;

#[async_trait]
impl<E, S> Sink<E> for Arc<S>
where
    E: Send + 'static,
    S: Sink<E> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        (**self).process(ctx, event).await
    }

    async fn flush(&self) -> Result<(), SinkError> {
        (**self).flush().await
    }

    async fn close(&self) -> Result<(), SinkError> {
        (**self).close().await
    }
}

/// Sink backed by an async closure
pub struct FnSink<F> {
    name: String,
    handler: F,
}

/// Build a named sink from a closure.
///
/// The closure receives an owned context clone and the event.
///
/// ```
/// use contracts::{sink_fn, Context, Event, Sink};
///
/// let sink = sink_fn("echo", |_ctx: Context, event: Event| async move { Ok(event) });
/// assert_eq!(sink.name(), "echo");
/// ```
pub fn sink_fn<F, Fut, E>(name: impl Into<String>, handler: F) -> FnSink<F>
where
    F: Fn(Context, E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<E, SinkError>> + Send,
    E: Send + 'static,
{
    FnSink {
        name: name.into(),
        handler,
    }
}

#[async_trait]
impl<F, Fut, E> Sink<E> for FnSink<F>
where
    F: Fn(Context, E) -> Fut + Send + Sync,
    Fut: Future<Output = Result<E, SinkError>> + Send,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        (self.handler)(ctx.clone(), event).await
    }
}
