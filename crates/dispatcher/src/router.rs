//! Router - signal to sink routing table
//!
//! Each signal owns a group whose shape follows its registered cardinality:
//!
//! | sinks | shape |
//! |---|---|
//! | 1 | [`Shape::Direct`]: the sink is called with no wrapping |
//! | 2+ | [`Shape::Sequence`] or [`Shape::FanOut`], fixed by the registration that added the second sink |
//!
//! Groups only grow. The table is read on every emit and written at setup
//! time, so lookups take a read lock just long enough to clone the group's
//! `Arc`; sinks always run with no table lock held.

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{Caller, Context, Delivery, Event, Field, SharedSink, Signal, SinkError};
use observability::metrics::{record_event_routed, record_event_unrouted, record_sink_failure};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::error::DispatcherError;

/// Anything the router can dispatch
pub trait Routable {
    fn signal(&self) -> &Signal;
}

impl Routable for Event {
    fn signal(&self) -> &Signal {
        Event::signal(self)
    }
}

/// Observable shape of a signal's group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Direct,
    Sequence,
    FanOut,
}

enum Group<E: Send + 'static> {
    Direct(SharedSink<E>),
    Sequence {
        sinks: Vec<SharedSink<E>>,
        /// At most one event in flight per group
        gate: Arc<tokio::sync::Mutex<()>>,
    },
    FanOut(Vec<SharedSink<E>>),
}

impl<E: Send + 'static> Group<E> {
    fn shape(&self) -> Shape {
        match self {
            Self::Direct(_) => Shape::Direct,
            Self::Sequence { .. } => Shape::Sequence,
            Self::FanOut(_) => Shape::FanOut,
        }
    }

    fn sinks(&self) -> &[SharedSink<E>] {
        match self {
            Self::Direct(sink) => std::slice::from_ref(sink),
            Self::Sequence { sinks, .. } | Self::FanOut(sinks) => sinks,
        }
    }

    /// Group after appending `sink`
    fn append(&self, signal: &Signal, sink: SharedSink<E>, delivery: Delivery) -> Self {
        match self {
            Self::Direct(first) => match delivery {
                Delivery::Sequential => Self::Sequence {
                    sinks: vec![Arc::clone(first), sink],
                    gate: Arc::new(tokio::sync::Mutex::new(())),
                },
                Delivery::Parallel => Self::FanOut(vec![Arc::clone(first), sink]),
            },
            Self::Sequence { sinks, gate } => {
                if delivery != Delivery::Sequential {
                    debug!(signal = %signal, "Signal already sequential, delivery request ignored");
                }
                let mut sinks = sinks.clone();
                sinks.push(sink);
                Self::Sequence {
                    sinks,
                    gate: Arc::clone(gate),
                }
            }
            Self::FanOut(sinks) => {
                if delivery != Delivery::Parallel {
                    debug!(signal = %signal, "Signal already fan-out, delivery request ignored");
                }
                let mut sinks = sinks.clone();
                sinks.push(sink);
                Self::FanOut(sinks)
            }
        }
    }
}

/// Signal-keyed router for events of type `E`
pub struct Router<E: Send + 'static> {
    table: RwLock<HashMap<Signal, Arc<Group<E>>>>,
    delivery: Delivery,
    fan_out: TaskTracker,
}

/// The default router over [`Event`]
pub type Logger = Router<Event>;

impl<E> Default for Router<E>
where
    E: Routable + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::with_delivery(Delivery::Sequential)
    }
}

impl<E> Router<E>
where
    E: Routable + Clone + Send + Sync + 'static,
{
    /// Router whose multi-sink groups use `delivery` unless a registration
    /// says otherwise
    pub fn with_delivery(delivery: Delivery) -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            delivery,
            fan_out: TaskTracker::new(),
        }
    }

    pub fn sequential() -> Self {
        Self::with_delivery(Delivery::Sequential)
    }

    /// Fan-out router: every sink gets its own clone, nobody waits
    pub fn parallel() -> Self {
        Self::with_delivery(Delivery::Parallel)
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Append `sink` to the group for `signal`.
    ///
    /// Registering the same sink twice means it runs twice per event.
    pub fn register(&self, signal: impl Into<Signal>, sink: SharedSink<E>) {
        self.register_with(signal, sink, self.delivery);
    }

    /// Like [`register`](Self::register) with an explicit delivery choice.
    ///
    /// Only the registration that adds a signal's second sink decides its
    /// shape; later choices are ignored.
    pub fn register_with(&self, signal: impl Into<Signal>, sink: SharedSink<E>, delivery: Delivery) {
        let signal = signal.into();
        let sink_name = sink.name().to_string();

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let group = match table.get(&signal) {
            None => Group::Direct(sink),
            Some(existing) => existing.append(&signal, sink, delivery),
        };
        let shape = group.shape();
        let count = group.sinks().len();
        table.insert(signal.clone(), Arc::new(group));
        drop(table);

        debug!(signal = %signal, sink = %sink_name, sinks = count, shape = ?shape, "Sink registered");
    }

    fn lookup(&self, signal: &Signal) -> Option<Arc<Group<E>>> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(signal)
            .cloned()
    }

    /// Deliver a pre-built event.
    ///
    /// Never fails: unrouted events are dropped and sink errors are logged
    /// and counted. Direct and sequence groups are awaited; fan-out sinks
    /// run on their own tasks and are not waited for here. [`shutdown`]
    /// waits for them.
    ///
    /// [`shutdown`]: Self::shutdown
    pub async fn route(&self, ctx: Context, event: E) {
        let signal = event.signal().clone();
        let Some(group) = self.lookup(&signal) else {
            trace!(signal = %signal, "No sinks registered, event dropped");
            record_event_unrouted(&signal);
            return;
        };
        record_event_routed(&signal, group.sinks().len());

        match &*group {
            Group::Direct(sink) => {
                if let Err(err) = sink.process(&ctx, event).await {
                    sink_failed(&signal, sink.name(), &err);
                }
            }
            Group::Sequence { sinks, gate } => {
                let _turn = gate.lock().await;
                for sink in sinks {
                    if let Err(err) = sink.process(&ctx, event.clone()).await {
                        sink_failed(&signal, sink.name(), &err);
                    }
                }
            }
            Group::FanOut(sinks) => {
                for sink in sinks {
                    let sink = Arc::clone(sink);
                    let ctx = ctx.clone();
                    let event = event.clone();
                    let signal = signal.clone();
                    self.fan_out.spawn(async move {
                        if let Err(err) = sink.process(&ctx, event).await {
                            sink_failed(&signal, sink.name(), &err);
                        }
                    });
                }
            }
        }
    }

    /// Registered signals, sorted
    pub fn signals(&self) -> Vec<Signal> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        let mut signals: Vec<Signal> = table.keys().cloned().collect();
        signals.sort();
        signals
    }

    pub fn sink_count(&self, signal: &str) -> usize {
        self.lookup(&Signal::from(signal))
            .map_or(0, |group| group.sinks().len())
    }

    pub fn shape(&self, signal: &str) -> Option<Shape> {
        self.lookup(&Signal::from(signal)).map(|group| group.shape())
    }

    /// Names of the sinks for `signal`, in registration order
    pub fn sink_names(&self, signal: &str) -> Vec<String> {
        self.lookup(&Signal::from(signal))
            .map(|group| group.sinks().iter().map(|s| s.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Wait for in-flight fan-out deliveries, then flush and close every
    /// distinct registered sink once.
    ///
    /// All sinks are attempted; the first failure is returned.
    pub async fn shutdown(&self) -> Result<(), DispatcherError> {
        self.fan_out.close();
        self.fan_out.wait().await;
        self.fan_out.reopen();

        let mut distinct: Vec<SharedSink<E>> = Vec::new();
        {
            let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
            for group in table.values() {
                for sink in group.sinks() {
                    let ptr = Arc::as_ptr(sink) as *const ();
                    if !distinct.iter().any(|s| Arc::as_ptr(s) as *const () == ptr) {
                        distinct.push(Arc::clone(sink));
                    }
                }
            }
        }

        let mut first_err = None;
        for sink in &distinct {
            let result = match sink.flush().await {
                Ok(()) => sink.close().await,
                Err(err) => {
                    let _ = sink.close().await;
                    Err(err)
                }
            };
            if let Err(err) = result {
                warn!(sink = sink.name(), error = %err, "Sink shutdown failed");
                first_err.get_or_insert(DispatcherError::Shutdown {
                    sink_name: sink.name().to_string(),
                    source: err,
                });
            }
        }

        info!(sinks = distinct.len(), "Router shutdown complete");
        first_err.map_or(Ok(()), Err)
    }
}

fn sink_failed(signal: &Signal, sink_name: &str, err: &SinkError) {
    warn!(signal = %signal, sink = sink_name, error = %err, "Sink failed");
    record_sink_failure(signal, sink_name);
}

impl Router<Event> {
    /// Sequential logger, the same shape the process-wide default uses
    pub fn new() -> Self {
        Self::sequential()
    }

    /// Build an event at the call site and route it.
    ///
    /// The caller's file and line are captured here; the context is the one
    /// installed with [`Context::scope`], if any.
    #[track_caller]
    pub fn emit(
        &self,
        signal: impl Into<Signal>,
        message: impl Into<String>,
        fields: impl IntoIterator<Item = Field>,
    ) -> impl Future<Output = ()> + Send + '_ {
        let caller = Caller::from_location(Location::caller());
        let event = Event::new(signal, message, fields).with_caller(caller);
        self.route(Context::current(), event)
    }

    /// [`emit`](Self::emit) with an explicit context
    #[track_caller]
    pub fn emit_ctx(
        &self,
        ctx: Context,
        signal: impl Into<Signal>,
        message: impl Into<String>,
        fields: impl IntoIterator<Item = Field>,
    ) -> impl Future<Output = ()> + Send + '_ {
        let caller = Caller::from_location(Location::caller());
        let event = Event::new(signal, message, fields).with_caller(caller);
        self.route(ctx, event)
    }
}
