//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 按 signal 将事件路由到已注册的 sinks
//! - 根据 sink 数量选择投递方式 (Direct / Sequence / FanOut)
//! - 在路由边界吸收 sink 错误，`emit` 永不失败
//! - 终端 sinks：轮转文件、tracing 日志、内存捕获
//! - 从 `DispatchConfig` 构建完整的 logger

pub mod builder;
pub mod error;
pub mod global;
pub mod router;
pub mod sinks;

pub use builder::{create_dispatcher, Dispatcher, DispatcherBuilder};
pub use contracts::{Event, Sink};
pub use error::DispatcherError;
pub use global::{emit, global, hook};
pub use router::{Logger, Routable, Router, Shape};
pub use sinks::{LogSink, MemorySink, RotatingFileConfig, RotatingFileSink, RotatingWriter};
