//! DispatchConfig - Config Loader 输出
//!
//! 描述完整的分发配置：路由策略、sink 定义、adapter 栈、signal 路由表。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的分发配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 路由器设置
    #[serde(default)]
    pub router: RouterSettings,

    /// Sink 定义列表
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkConfig>,

    /// Signal 路由表
    #[serde(default)]
    #[validate(nested)]
    pub routes: Vec<RouteConfig>,
}

/// 路由器设置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterSettings {
    /// 多个 sink 时的默认投递方式
    #[serde(default)]
    pub delivery: Delivery,
}

/// Delivery policy for a signal with two or more sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Registration order, one sink at a time, same event data
    #[default]
    Sequential,
    /// Fire-and-forget fan-out, each sink gets its own clone
    Parallel,
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称 (路由引用)
    #[validate(length(min = 1, message = "sink name cannot be empty"))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Adapter 栈 (第一个最靠内)
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// tracing 日志输出
    Log,
    /// 按大小轮转的 NDJSON 文件
    RotatingFile,
}

/// Adapter 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterConfig {
    Retry {
        attempts: u32,
    },
    Backoff {
        attempts: u32,
        #[serde(default = "default_backoff_base_ms")]
        base_ms: u64,
    },
    Timeout {
        timeout_ms: u64,
    },
    CircuitBreaker {
        #[serde(default = "default_failure_threshold")]
        failure_threshold: u32,
        #[serde(default = "default_success_threshold")]
        success_threshold: u32,
        #[serde(default = "default_reset_timeout_ms")]
        reset_timeout_ms: u64,
    },
    RateLimit {
        rps: f64,
        burst: u32,
        /// 等待令牌 (true) 或直接拒绝 (false)
        #[serde(default)]
        wait: bool,
    },
    /// 失败时转交给已声明的另一个 sink
    Fallback {
        sink: String,
    },
    Async,
    /// 仅处理包含该字段的事件
    Filter {
        has_field: String,
    },
    Sampling {
        rate: f64,
        #[serde(default)]
        mode: SamplingMode,
    },
    Batch {
        size: usize,
    },
    Metrics,
}

impl AdapterConfig {
    /// Config tag of this adapter
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Retry { .. } => "retry",
            Self::Backoff { .. } => "backoff",
            Self::Timeout { .. } => "timeout",
            Self::CircuitBreaker { .. } => "circuit_breaker",
            Self::RateLimit { .. } => "rate_limit",
            Self::Fallback { .. } => "fallback",
            Self::Async => "async",
            Self::Filter { .. } => "filter",
            Self::Sampling { .. } => "sampling",
            Self::Batch { .. } => "batch",
            Self::Metrics => "metrics",
        }
    }
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    1
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

/// 采样方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// 每 round(1/rate) 个事件处理一个
    #[default]
    Deterministic,
    /// 每个事件独立随机
    Random,
}

/// Signal 路由
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RouteConfig {
    /// 路由键
    #[validate(length(min = 1, message = "signal cannot be empty"))]
    pub signal: String,

    /// 按注册顺序排列的 sink 名称
    #[validate(length(min = 1, message = "route must name at least one sink"))]
    pub sinks: Vec<String>,

    /// 覆盖默认投递方式
    #[serde(default)]
    pub delivery: Option<Delivery>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TOML: &str = r#"
[router]
delivery = "parallel"

[[sinks]]
name = "audit"
sink_type = "rotating_file"
[sinks.params]
path = "logs/audit.log"
[[sinks.adapters]]
kind = "retry"
attempts = 3
[[sinks.adapters]]
kind = "async"

[[routes]]
signal = "ORDER_PLACED"
sinks = ["audit"]
delivery = "sequential"
"#;

    #[test]
    fn test_parse_toml() {
        let config: DispatchConfig = toml::from_str(SAMPLE_TOML).unwrap();

        assert_eq!(config.version, ConfigVersion::V1);
        assert_eq!(config.router.delivery, Delivery::Parallel);
        assert_eq!(config.sinks[0].sink_type, SinkType::RotatingFile);
        assert_eq!(
            config.sinks[0].adapters,
            vec![AdapterConfig::Retry { attempts: 3 }, AdapterConfig::Async]
        );
        assert_eq!(config.routes[0].delivery, Some(Delivery::Sequential));
    }

    #[test]
    fn test_adapter_defaults() {
        let adapter: AdapterConfig =
            serde_json::from_str(r#"{"kind": "circuit_breaker"}"#).unwrap();
        assert_eq!(
            adapter,
            AdapterConfig::CircuitBreaker {
                failure_threshold: 5,
                success_threshold: 1,
                reset_timeout_ms: 30_000,
            }
        );
        assert_eq!(adapter.kind(), "circuit_breaker");

        let adapter: AdapterConfig =
            serde_json::from_str(r#"{"kind": "sampling", "rate": 0.25}"#).unwrap();
        assert_eq!(
            adapter,
            AdapterConfig::Sampling {
                rate: 0.25,
                mode: SamplingMode::Deterministic,
            }
        );
    }

    #[test]
    fn test_validate_rejects_empty_route() {
        let config = DispatchConfig {
            routes: vec![RouteConfig {
                signal: String::new(),
                sinks: vec![],
                delivery: None,
            }],
            ..Default::default()
        };

        let errors = config.validate().unwrap_err();
        let text = errors.to_string();
        assert!(text.contains("signal cannot be empty"), "{text}");
        assert!(text.contains("at least one sink"), "{text}");
    }
}
