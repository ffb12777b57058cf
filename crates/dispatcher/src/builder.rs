//! Dispatcher - logger built from configuration
//!
//! Sinks are created in declaration order, each wrapped in its adapter
//! stack (first adapter innermost), then routes register them by name.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use adapters::{has_field, BreakerConfig, MetricsSnapshot, RateLimitMode, SinkExt, SinkMetrics};
use contracts::{AdapterConfig, DispatchConfig, SharedSink, SinkConfig, SinkType};
use tracing::{info, instrument};

use crate::error::DispatcherError;
use crate::router::Logger;
use crate::sinks::{LogSink, RotatingFileSink};

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatchConfig,
    /// Sinks supplied in code, looked up by name before config sinks
    extra_sinks: HashMap<String, SharedSink>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            extra_sinks: HashMap::new(),
        }
    }

    /// Make a sink built in code available to routes and fallbacks
    pub fn with_sink(mut self, name: impl Into<String>, sink: SharedSink) -> Self {
        self.extra_sinks.insert(name.into(), sink);
        self
    }

    /// Build every sink and register every route
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(sinks = self.config.sinks.len(), routes = self.config.routes.len())
    )]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut built: HashMap<String, SharedSink> = self.extra_sinks;
        let mut sink_metrics = Vec::new();

        for sink_config in &self.config.sinks {
            let (sink, metrics) = create_sink(sink_config, &built)?;
            if let Some(metrics) = metrics {
                sink_metrics.push((sink_config.name.clone(), metrics));
            }
            built.insert(sink_config.name.clone(), sink);
        }

        let logger = Logger::with_delivery(self.config.router.delivery);
        for route in &self.config.routes {
            let delivery = route.delivery.unwrap_or(self.config.router.delivery);
            for sink_name in &route.sinks {
                let sink = built
                    .get(sink_name)
                    .ok_or_else(|| DispatcherError::UnknownSink {
                        signal: route.signal.clone(),
                        sink: sink_name.clone(),
                    })?;
                logger.register_with(route.signal.as_str(), Arc::clone(sink), delivery);
            }
        }

        info!(
            signals = logger.signals().len(),
            sinks = built.len(),
            "Dispatcher built"
        );

        Ok(Dispatcher {
            logger,
            sink_metrics,
        })
    }
}

/// Create a sink and its adapter stack from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(config, built),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink(
    config: &SinkConfig,
    built: &HashMap<String, SharedSink>,
) -> Result<(SharedSink, Option<Arc<SinkMetrics>>), DispatcherError> {
    let mut sink: SharedSink = match config.sink_type {
        SinkType::Log => Arc::new(LogSink::new(&config.name)),
        SinkType::RotatingFile => Arc::new(
            RotatingFileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e))?,
        ),
    };

    let mut metrics = None;
    for adapter in &config.adapters {
        sink = match adapter {
            AdapterConfig::Retry { attempts } => sink.with_retry(*attempts).shared(),
            AdapterConfig::Backoff { attempts, base_ms } => sink
                .with_backoff(*attempts, Duration::from_millis(*base_ms))
                .shared(),
            AdapterConfig::Timeout { timeout_ms } => sink
                .with_timeout(Duration::from_millis(*timeout_ms))
                .shared(),
            AdapterConfig::CircuitBreaker {
                failure_threshold,
                success_threshold,
                reset_timeout_ms,
            } => sink
                .with_circuit_breaker(BreakerConfig {
                    failure_threshold: *failure_threshold,
                    success_threshold: *success_threshold,
                    reset_timeout: Duration::from_millis(*reset_timeout_ms),
                })
                .shared(),
            AdapterConfig::RateLimit { rps, burst, wait } => {
                let mode = if *wait {
                    RateLimitMode::Wait
                } else {
                    RateLimitMode::Drop
                };
                sink.with_rate_limit(*rps, *burst, mode).shared()
            }
            AdapterConfig::Fallback { sink: secondary } => {
                let secondary = built.get(secondary).ok_or_else(|| {
                    DispatcherError::sink_creation(
                        &config.name,
                        format!("fallback sink '{secondary}' is not declared before it"),
                    )
                })?;
                sink.with_fallback(Arc::clone(secondary)).shared()
            }
            AdapterConfig::Async => sink.with_async().shared(),
            AdapterConfig::Filter { has_field: key } => {
                sink.with_filter(has_field(key.clone())).shared()
            }
            AdapterConfig::Sampling { rate, mode } => sink.with_sampling(*rate, *mode).shared(),
            AdapterConfig::Batch { size } => sink.with_batch(*size).shared(),
            AdapterConfig::Metrics => {
                let instrumented = sink.with_metrics();
                metrics = Some(instrumented.metrics());
                instrumented.shared()
            }
        };
    }

    Ok((sink, metrics))
}

/// Logger assembled from configuration, plus per-sink metrics handles
pub struct Dispatcher {
    logger: Logger,
    sink_metrics: Vec<(String, Arc<SinkMetrics>)>,
}

impl Dispatcher {
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn into_logger(self) -> Logger {
        self.logger
    }

    /// Get metrics for every sink with a `metrics` adapter
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sink_metrics
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.snapshot()))
            .collect()
    }

    /// Flush and close every sink
    pub async fn shutdown(&self) -> Result<(), DispatcherError> {
        self.logger.shutdown().await
    }
}

/// Convenience function to create a dispatcher from configuration
pub fn create_dispatcher(config: DispatchConfig) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(config).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Shape;
    use crate::sinks::MemorySink;
    use contracts::{fields, Delivery, RouteConfig};
    use tempfile::tempdir;

    fn sink(name: &str, sink_type: SinkType, adapters: Vec<AdapterConfig>) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            sink_type,
            params: HashMap::new(),
            adapters,
        }
    }

    fn route(signal: &str, sinks: &[&str], delivery: Option<Delivery>) -> RouteConfig {
        RouteConfig {
            signal: signal.to_string(),
            sinks: sinks.iter().map(|s| s.to_string()).collect(),
            delivery,
        }
    }

    #[tokio::test]
    async fn test_build_routes_by_config() {
        let config = DispatchConfig {
            sinks: vec![
                sink("console", SinkType::Log, vec![AdapterConfig::Metrics]),
                sink("quiet", SinkType::Log, vec![AdapterConfig::Async]),
            ],
            routes: vec![
                route("ORDER_PLACED", &["console", "quiet"], None),
                route("LOGIN", &["console", "quiet"], Some(Delivery::Parallel)),
                route("AUDIT", &["quiet"], None),
            ],
            ..Default::default()
        };

        let dispatcher = create_dispatcher(config).unwrap();
        let logger = dispatcher.logger();

        assert_eq!(logger.shape("ORDER_PLACED"), Some(Shape::Sequence));
        assert_eq!(logger.shape("LOGIN"), Some(Shape::FanOut));
        assert_eq!(logger.shape("AUDIT"), Some(Shape::Direct));

        logger.emit("ORDER_PLACED", "hello", fields!["n" => 1]).await;
        let metrics = dispatcher.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].0, "console");
        assert_eq!(metrics[0].1.success_count, 1);
    }

    #[test]
    fn test_unknown_route_sink() {
        let config = DispatchConfig {
            routes: vec![route("S", &["missing"], None)],
            ..Default::default()
        };

        let err = create_dispatcher(config).err().unwrap();
        assert!(matches!(err, DispatcherError::UnknownSink { .. }));
    }

    #[test]
    fn test_fallback_must_be_declared_first() {
        let config = DispatchConfig {
            sinks: vec![sink(
                "primary",
                SinkType::Log,
                vec![AdapterConfig::Fallback {
                    sink: "later".to_string(),
                }],
            )],
            ..Default::default()
        };

        let err = create_dispatcher(config).err().unwrap();
        assert!(err.to_string().contains("later"), "{err}");
    }

    #[test]
    fn test_rotating_file_requires_path() {
        let config = DispatchConfig {
            sinks: vec![sink("file", SinkType::RotatingFile, vec![])],
            ..Default::default()
        };

        let err = create_dispatcher(config).err().unwrap();
        assert!(matches!(err, DispatcherError::SinkCreation { .. }));
    }

    #[tokio::test]
    async fn test_fallback_to_code_sink() {
        let dir = tempdir().unwrap();
        // Parent is a regular file: the rotating sink is unavailable
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let mut file = sink(
            "file",
            SinkType::RotatingFile,
            vec![AdapterConfig::Fallback {
                sink: "memory".to_string(),
            }],
        );
        file.params.insert(
            "path".to_string(),
            blocker.join("x.log").to_string_lossy().into_owned(),
        );

        let memory: Arc<MemorySink> = Arc::new(MemorySink::new("memory"));
        let dispatcher = DispatcherBuilder::new(DispatchConfig {
            sinks: vec![file],
            routes: vec![route("S", &["file"], None)],
            ..Default::default()
        })
        .with_sink("memory", memory.clone())
        .build()
        .unwrap();

        dispatcher.logger().emit("S", "rescued", fields![]).await;

        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_adapter_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.log");

        let mut file = sink(
            "file",
            SinkType::RotatingFile,
            vec![
                AdapterConfig::Filter {
                    has_field: "user".to_string(),
                },
                AdapterConfig::Metrics,
            ],
        );
        file.params
            .insert("path".to_string(), path.to_string_lossy().into_owned());

        let dispatcher = create_dispatcher(DispatchConfig {
            sinks: vec![file],
            routes: vec![route("LOGIN", &["file"], None)],
            ..Default::default()
        })
        .unwrap();

        let logger = dispatcher.logger();
        logger.emit("LOGIN", "kept", fields!["user" => "u1"]).await;
        logger.emit("LOGIN", "skipped", fields!["ip" => "10.0.0.1"]).await;
        dispatcher.shutdown().await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("kept"), "{written}");
        assert_eq!(dispatcher.metrics()[0].1.success_count, 2);
    }
}
