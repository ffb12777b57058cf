//! Fire-and-forget offload

use std::sync::Arc;

use contracts::{async_trait, Context, Sink, SinkError};
use tokio_util::task::TaskTracker;

/// Runs the inner sink on a spawned task and reports success immediately.
///
/// The task gets [`Context::detached`]: the caller's values survive but its
/// deadline and cancellation do not. Errors from the background call are
/// discarded and there is no backpressure; every call spawns.
///
/// `flush` and `close` wait for every call already accepted before
/// reaching the inner sink.
pub struct Detached<S> {
    inner: Arc<S>,
    tasks: TaskTracker,
}

impl<S> Detached<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
            tasks: TaskTracker::new(),
        }
    }

    /// Background calls still running
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}

#[async_trait]
impl<S, E> Sink<E> for Detached<S>
where
    S: Sink<E> + 'static,
    E: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn process(&self, ctx: &Context, event: E) -> Result<E, SinkError> {
        let inner = Arc::clone(&self.inner);
        let background = ctx.detached();
        let copy = event.clone();
        self.tasks.spawn(async move {
            let _ = inner.process(&background, copy).await;
        });
        Ok(event)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.drain().await;
        self.tasks.reopen();
        self.inner.flush().await
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.drain().await;
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{event, ScriptedSink};
    use crate::Timeout;
    use contracts::{sink_fn, Event};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_returns_before_inner_finishes() {
        let (tx, rx) = oneshot::channel::<()>();
        let rx = std::sync::Mutex::new(Some(rx));
        let sink = Detached::new(sink_fn("blocked", move |_ctx: Context, event: Event| {
            let rx = rx.lock().unwrap().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                Ok(event)
            }
        }));

        assert!(sink.process(&Context::background(), event()).await.is_ok());
        drop(tx);
    }

    #[tokio::test]
    async fn test_errors_are_discarded() {
        let inner = Arc::new(ScriptedSink::failing("down"));
        let sink = Detached::new(Arc::clone(&inner));

        assert!(sink.process(&Context::background(), event()).await.is_ok());
        tokio::time::timeout(Duration::from_secs(1), async {
            while inner.calls() == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_ignores_caller_cancellation() {
        let (tx, rx) = oneshot::channel();
        let tx = std::sync::Mutex::new(Some(tx));
        let sink = Detached::new(sink_fn("bg", move |ctx: Context, event: Event| {
            let tx = tx.lock().unwrap().take();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if let Some(tx) = tx {
                    let _ = tx.send((ctx.err().is_none(), ctx.value("trace_id").map(String::from)));
                }
                Ok(event)
            }
        }));

        let ctx = Context::background().with_value("trace_id", "t-1");
        sink.process(&ctx, event()).await.unwrap();
        ctx.cancel();

        let (alive, trace_id) = rx.await.unwrap();
        assert!(alive);
        assert_eq!(trace_id.as_deref(), Some("t-1"));
    }

    fn slow_counter(calls: &Arc<AtomicUsize>) -> impl Sink<Event> {
        let calls = Arc::clone(calls);
        sink_fn("slow", move |_ctx: Context, event: Event| {
            let calls = Arc::clone(&calls);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(event)
            }
        })
    }

    #[tokio::test]
    async fn test_flush_waits_for_accepted_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Detached::new(slow_counter(&calls));

        for _ in 0..10 {
            sink.process(&Context::background(), event()).await.unwrap();
        }
        assert_eq!(sink.in_flight(), 10);
        Sink::<Event>::flush(&sink).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 10);

        // Still usable after a flush
        sink.process(&Context::background(), event()).await.unwrap();
        Sink::<Event>::flush(&sink).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn test_close_waits_for_accepted_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Detached::new(slow_counter(&calls));

        for _ in 0..5 {
            sink.process(&Context::background(), event()).await.unwrap();
        }
        Sink::<Event>::close(&sink).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sink.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_outside_async_never_fires() {
        let sink = Timeout::new(
            Detached::new(sink_fn("slow", |_ctx: Context, event: Event| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(event)
            })),
            Duration::from_millis(10),
        );

        assert!(sink.process(&Context::background(), event()).await.is_ok());
    }
}
