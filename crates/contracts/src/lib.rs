//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - [`Signal`] is the routing key; it names what happened, not how severe it is
//! - [`Event`] is immutable apart from each copy's own field list
//! - [`Sink`] is the one processing interface shared by terminal sinks and adapters

mod config;
mod context;
mod error;
mod event;
mod field;
mod signal;
mod sink;

pub use config::*;
pub use context::Context;
pub use error::*;
pub use event::{Caller, Event};
pub use field::{Field, FieldType, FieldValue, IntoFieldValue};
pub use signal::Signal;
pub use sink::{sink_fn, FnSink, SharedSink, Sink};

pub use async_trait::async_trait;
