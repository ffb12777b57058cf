//! Sink implementations
//!
//! Contains RotatingFileSink, LogSink, and MemorySink.

mod log;
mod memory;
mod rotating_file;

pub use self::log::LogSink;
pub use self::memory::MemorySink;
pub use self::rotating_file::{RotatingFileConfig, RotatingFileSink, RotatingWriter};
