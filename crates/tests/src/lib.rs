//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 → dispatcher → sink 的端到端测试
//! - 自定义事件类型的路由测试

#[cfg(test)]
mod contract_tests {
    use contracts::{AdapterConfig, ConfigVersion, Delivery, SinkType};

    #[test]
    fn test_config_contract_shape() {
        let config = config_loader::ConfigLoader::load_from_str(
            r#"
version = "V1"

[router]
delivery = "parallel"

[[sinks]]
name = "console"
sink_type = "log"
adapters = [{ kind = "retry", attempts = 3 }, { kind = "async" }]

[[routes]]
signal = "ORDER_PLACED"
sinks = ["console"]
delivery = "sequential"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.version, ConfigVersion::V1);
        assert_eq!(config.router.delivery, Delivery::Parallel);
        assert_eq!(config.sinks[0].sink_type, SinkType::Log);
        assert_eq!(
            config.sinks[0].adapters,
            vec![AdapterConfig::Retry { attempts: 3 }, AdapterConfig::Async]
        );
        assert_eq!(config.routes[0].delivery, Some(Delivery::Sequential));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use adapters::SinkExt;
    use contracts::{fields, sink_fn, Context, Event, FieldType, Signal, SinkError};
    use dispatcher::{create_dispatcher, Logger, MemorySink, Routable, Router, Shape};
    use tempfile::tempdir;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        if !path.exists() {
            return Vec::new();
        }
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Config → Dispatcher → RotatingFileSink
    ///
    /// 验证：
    /// 1. 每行是一个完整的 JSON 对象
    /// 2. 超过 max_bytes 时轮转，备份数量不超过 max_backups
    /// 3. 最新的事件总在当前文件中
    #[tokio::test]
    async fn test_config_to_rotating_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("events.log");
        let toml = format!(
            r#"
[[sinks]]
name = "file"
sink_type = "rotating_file"
params = {{ path = '{}', max_bytes = "400", max_backups = "2" }}
adapters = [{{ kind = "metrics" }}]

[[routes]]
signal = "ORDER_PLACED"
sinks = ["file"]
"#,
            path.display()
        );
        let config = config_loader::ConfigLoader::load_from_str(
            &toml,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let dispatcher = create_dispatcher(config).unwrap();
        for i in 0..30 {
            dispatcher
                .logger()
                .emit(
                    "ORDER_PLACED",
                    "order accepted",
                    fields!["seq" => i, "user" => "u1"],
                )
                .await;
        }
        dispatcher.shutdown().await.unwrap();

        let current = read_lines(&path);
        let backup_1 = read_lines(&path.with_file_name("events.log.1"));
        let backup_2 = read_lines(&path.with_file_name("events.log.2"));

        assert!(!path.with_file_name("events.log.3").exists());
        assert!(!backup_1.is_empty(), "expected at least one rotation");
        assert!(std::fs::metadata(&path).unwrap().len() <= 400);

        let last = current.last().unwrap();
        assert_eq!(last["seq"], 29);
        assert_eq!(last["signal"], "ORDER_PLACED");
        assert_eq!(last["message"], "order accepted");
        assert!(last["time"].is_string());

        // Backups hold strictly older events
        let newest_backup = backup_1.last().unwrap()["seq"].as_i64().unwrap();
        assert!(newest_backup < current[0]["seq"].as_i64().unwrap());
        if let Some(older) = backup_2.last() {
            assert!(older["seq"].as_i64().unwrap() < backup_1[0]["seq"].as_i64().unwrap());
        }

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].1.success_count, 30);
    }

    /// Context installed with `scope` reaches sinks behind adapters
    #[tokio::test]
    async fn test_scoped_context_reaches_wrapped_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot = Arc::clone(&seen);
        let sink = sink_fn("ctx", move |ctx: Context, event: Event| {
            let slot = Arc::clone(&slot);
            async move {
                slot.lock()
                    .unwrap()
                    .push(ctx.value("trace_id").map(String::from));
                Ok(event)
            }
        })
        .with_retry(2)
        .with_timeout(Duration::from_secs(1))
        .shared();

        let logger = Logger::new();
        logger.register("REQUEST", sink);

        Context::background()
            .with_value("trace_id", "t-42")
            .scope(async {
                logger.emit("REQUEST", "handled", fields![]).await;
            })
            .await;
        logger.emit("REQUEST", "no scope", fields![]).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("t-42".to_string()), None]
        );
    }

    /// ORDER_PLACED: retried primary, then audit sink, in sequence
    #[tokio::test]
    async fn test_order_placed_sequence_with_adapters() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let flaky = sink_fn("payments", move |_ctx: Context, event: Event| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(SinkError::handler("payments", "transient"));
                }
                Ok(event)
            }
        });
        let captured: Arc<MemorySink> = Arc::new(MemorySink::new("payments-captured"));
        let capture = Arc::clone(&captured);
        let primary = flaky
            .with_filter(|_ctx: &Context, event: &Event| event.has_field("amount"))
            .with_retry(3)
            .with_metrics();
        let metrics = primary.metrics();

        let audit: Arc<MemorySink> = Arc::new(MemorySink::new("audit"));
        let logger = Logger::new();
        logger.register("ORDER_PLACED", primary.shared());
        logger.register("ORDER_PLACED", audit.clone());
        logger.register("ORDER_PLACED", capture);

        logger
            .emit(
                "ORDER_PLACED",
                "order accepted",
                fields!["amount" => 99.99, "user" => "u1"],
            )
            .await;

        assert_eq!(logger.shape("ORDER_PLACED"), Some(Shape::Sequence));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.success_count(), 1);

        let events = captured.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.signal().as_str(), "ORDER_PLACED");
        assert_eq!(event.message(), "order accepted");
        let amount = event.field("amount").unwrap();
        assert_eq!(amount.field_type(), FieldType::Float64);
        assert_eq!(amount.as_f64(), Some(99.99));
        assert_eq!(audit.len(), 1);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Reading {
        signal: Signal,
        source: String,
        value: f64,
    }

    impl Routable for Reading {
        fn signal(&self) -> &Signal {
            &self.signal
        }
    }

    fn reading(source: &str, value: f64) -> Reading {
        Reading {
            signal: Signal::from("READING"),
            source: source.to_string(),
            value,
        }
    }

    /// A router over a caller-defined event type, fan-out delivery
    #[tokio::test]
    async fn test_typed_router_fan_out() {
        let router: Router<Reading> = Router::parallel();
        let first: Arc<MemorySink<Reading>> = Arc::new(MemorySink::new("first"));
        let second: Arc<MemorySink<Reading>> = Arc::new(MemorySink::new("second"));
        router.register("READING", first.clone());
        router.register("READING", second.clone());

        router
            .route(Context::background(), reading("thermo", 21.5))
            .await;
        router
            .route(Context::background(), reading("unrouted", 0.0).with_signal("OTHER"))
            .await;

        // Fan-out runs on spawned tasks
        for _ in 0..100 {
            if first.len() == 1 && second.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(router.shape("READING"), Some(Shape::FanOut));
        assert_eq!(first.events(), vec![reading("thermo", 21.5)]);
        assert_eq!(second.events(), vec![reading("thermo", 21.5)]);

        router.shutdown().await.unwrap();
    }

    fn load_toml(toml: &str) -> contracts::DispatchConfig {
        config_loader::ConfigLoader::load_from_str(toml, config_loader::ConfigFormat::Toml)
            .unwrap()
    }

    /// Shutdown right after a burst of parallel emits loses nothing
    #[tokio::test]
    async fn test_parallel_files_complete_after_shutdown() {
        let dir = tempdir().unwrap();
        let left = dir.path().join("left.log");
        let right = dir.path().join("right.log");
        let config = load_toml(&format!(
            r#"
[[sinks]]
name = "left"
sink_type = "rotating_file"
params = {{ path = '{}', max_bytes = "100000000" }}

[[sinks]]
name = "right"
sink_type = "rotating_file"
params = {{ path = '{}', max_bytes = "100000000" }}

[[routes]]
signal = "TICK"
sinks = ["left", "right"]
delivery = "parallel"
"#,
            left.display(),
            right.display()
        ));

        let dispatcher = create_dispatcher(config).unwrap();
        assert_eq!(dispatcher.logger().shape("TICK"), Some(Shape::FanOut));
        for i in 0..500 {
            dispatcher.logger().emit("TICK", "t", fields!["seq" => i]).await;
        }
        dispatcher.shutdown().await.unwrap();

        assert_eq!(read_lines(&left).len(), 500);
        assert_eq!(read_lines(&right).len(), 500);
    }

    /// The async adapter hands every accepted event to the file before close
    #[tokio::test]
    async fn test_async_file_complete_after_shutdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("async.log");
        let config = load_toml(&format!(
            r#"
[[sinks]]
name = "file"
sink_type = "rotating_file"
params = {{ path = '{}', max_bytes = "100000000" }}
adapters = [{{ kind = "async" }}]

[[routes]]
signal = "TICK"
sinks = ["file"]
"#,
            path.display()
        ));

        let dispatcher = create_dispatcher(config).unwrap();
        for i in 0..500 {
            dispatcher.logger().emit("TICK", "t", fields!["seq" => i]).await;
        }
        dispatcher.shutdown().await.unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 500);
        let mut seqs: Vec<i64> = lines.iter().map(|l| l["seq"].as_i64().unwrap()).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (0..500).collect::<Vec<i64>>());
    }

    impl Reading {
        fn with_signal(mut self, signal: &str) -> Self {
            self.signal = Signal::from(signal);
            self
        }
    }
}
