//! Process-wide default logger
//!
//! Convenience only: code that can hold a [`Logger`] should. The default
//! instance is sequential.

use std::future::Future;
use std::sync::OnceLock;

use contracts::{Field, SharedSink, Signal};

use crate::router::Logger;

static GLOBAL: OnceLock<Logger> = OnceLock::new();

/// The default logger, created on first use
pub fn global() -> &'static Logger {
    GLOBAL.get_or_init(Logger::new)
}

/// Register `sink` for `signal` on the default logger
pub fn hook(signal: impl Into<Signal>, sink: SharedSink) {
    global().register(signal, sink);
}

/// Emit through the default logger
#[track_caller]
pub fn emit(
    signal: impl Into<Signal>,
    message: impl Into<String>,
    fields: impl IntoIterator<Item = Field>,
) -> impl Future<Output = ()> + Send + 'static {
    global().emit(signal, message, fields)
}
