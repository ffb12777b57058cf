//! # Adapters
//!
//! Sink 装饰器：每个 adapter 包装一个内层 sink 并实现同一个 [`Sink`] trait，
//! 因此可以任意顺序组合。
//!
//! ## 组合顺序
//!
//! - `sink.with_timeout(d).with_retry(n)`: 每次重试都有独立超时
//! - `sink.with_retry(n).with_timeout(d)`: 超时限制整个重试过程
//! - `sink.with_async().with_timeout(d)`: 超时永远不会触发，
//!   因为 async 包装立即返回
//!
//! ## 使用示例
//!
//! ```
//! use std::time::Duration;
//!
//! use adapters::{BreakerConfig, SinkExt};
//! use contracts::{async_trait, Context, Event, SharedSink, Sink, SinkError};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Sink for Audit {
//!     fn name(&self) -> &str {
//!         "audit"
//!     }
//!
//!     async fn process(&self, _ctx: &Context, event: Event) -> Result<Event, SinkError> {
//!         Ok(event)
//!     }
//! }
//!
//! let sink: SharedSink = Audit
//!     .with_backoff(4, Duration::from_millis(50))
//!     .with_circuit_breaker(BreakerConfig::default())
//!     .with_metrics()
//!     .shared();
//! assert_eq!(sink.name(), "audit");
//! ```
//!
//! [`Sink`]: contracts::Sink

mod batch;
mod circuit_breaker;
mod detached;
mod ext;
mod fallback;
mod filter;
mod metrics;
mod rate_limiter;
mod retry;
mod sampling;
mod timeout;

pub use batch::Batch;
pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use detached::Detached;
pub use ext::SinkExt;
pub use fallback::Fallback;
pub use filter::{has_field, Filter};
pub use metrics::{Instrumented, MetricsSnapshot, SinkMetrics};
pub use rate_limiter::{RateLimitMode, RateLimiter};
pub use retry::{Retry, DEFAULT_BACKOFF_BASE};
pub use sampling::Sampling;
pub use timeout::{Timeout, DEFAULT_TIMEOUT};

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sinks shared by the adapter tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use contracts::{async_trait, Context, Event, Sink, SinkError};
    use tokio::time::Instant;

    /// Records every call and replays a scripted list of outcomes
    /// (`true` = success). Once the script runs out it keeps returning
    /// `default_ok`.
    pub struct ScriptedSink {
        name: String,
        script: Mutex<VecDeque<bool>>,
        default_ok: bool,
        calls: AtomicUsize,
        pub times: Mutex<Vec<Instant>>,
        pub seen: Mutex<Vec<Event>>,
    }

    impl ScriptedSink {
        pub fn new(name: &str, script: &[bool], default_ok: bool) -> Self {
            Self {
                name: name.to_string(),
                script: Mutex::new(script.iter().copied().collect()),
                default_ok,
                calls: AtomicUsize::new(0),
                times: Mutex::new(Vec::new()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn ok(name: &str) -> Self {
            Self::new(name, &[], true)
        }

        pub fn failing(name: &str) -> Self {
            Self::new(name, &[], false)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sink for ScriptedSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn process(&self, _ctx: &Context, event: Event) -> Result<Event, SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.times.lock().unwrap().push(Instant::now());
            self.seen.lock().unwrap().push(event.clone());
            let ok = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.default_ok);
            if ok {
                Ok(event)
            } else {
                Err(SinkError::handler(&self.name, "scripted failure"))
            }
        }
    }

    pub fn event() -> Event {
        Event::new("TEST", "hello", contracts::fields!["n" => 1])
    }
}
