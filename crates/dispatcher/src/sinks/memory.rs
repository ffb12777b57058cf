//! MemorySink - keeps every processed event

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use contracts::{Context, Event, Sink, SinkError};

/// Sink that captures events in memory (tests and in-process inspection)
pub struct MemorySink<E = Event> {
    name: String,
    events: Mutex<Vec<E>>,
}

impl<E> MemorySink<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<E>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl<E: Clone> MemorySink<E> {
    /// Copy of everything captured so far, in arrival order
    pub fn events(&self) -> Vec<E> {
        self.lock().clone()
    }
}

#[async_trait]
impl<E> Sink<E> for MemorySink<E>
where
    E: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _ctx: &Context, event: E) -> Result<E, SinkError> {
        self.lock().push(event.clone());
        Ok(event)
    }
}
