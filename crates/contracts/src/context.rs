//! Context - cancellation scope and request metadata
//!
//! Every sink call receives a [`Context`]. Waiting adapters select on
//! [`Context::done`] instead of polling. Metadata (trace ids, request ids)
//! travels in an immutable key/value map.
//!
//! Emitters that cannot thread a context through their call chain install
//! one for the duration of a future with [`Context::scope`]; `emit` picks it
//! up through [`Context::current`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::SinkError;

tokio::task_local! {
    static CURRENT: Context;
}

/// Cancellation-capable call context
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<BTreeMap<String, String>>,
}

impl Context {
    /// Fresh root context: never cancelled, no deadline, no values
    pub fn background() -> Self {
        Self::default()
    }

    /// Context cancelled together with `self`, but cancellable on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        }
    }

    /// Child context whose deadline is the earlier of `deadline` and the current one
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut child = self.child();
        child.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        child
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Copy of this context with one more key/value pair
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            values: Arc::new(values),
        }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Independent scope for background work.
    ///
    /// Keeps the values but drops the deadline and the link to the parent's
    /// cancellation.
    pub fn detached(&self) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            values: Arc::clone(&self.values),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Why the context is finished, if it is
    pub fn err(&self) -> Option<SinkError> {
        if self.token.is_cancelled() {
            return Some(SinkError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(SinkError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> SinkError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => SinkError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => SinkError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                SinkError::Cancelled
            }
        }
    }

    /// Run `future` with `self` installed as the task's current context.
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        CURRENT.scope(self, future).await
    }

    /// Context installed by the enclosing [`Context::scope`], or a background one
    pub fn current() -> Self {
        CURRENT.try_with(Clone::clone).unwrap_or_default()
    }
}
