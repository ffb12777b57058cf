//! 分发指标收集模块
//!
//! 封装 `metrics` facade，统一指标名称与标签。

use metrics::{counter, gauge, histogram};

/// 记录事件已路由
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_event_routed;
///
/// record_event_routed("ORDER_PLACED", 2);
/// ```
pub fn record_event_routed(signal: &str, sinks: usize) {
    counter!(
        "sigroute_events_routed_total",
        "signal" => signal.to_string()
    )
    .increment(1);
    histogram!("sigroute_route_fanout").record(sinks as f64);
}

/// 记录无人监听的事件 (被丢弃)
pub fn record_event_unrouted(signal: &str) {
    counter!(
        "sigroute_events_unrouted_total",
        "signal" => signal.to_string()
    )
    .increment(1);
}

/// 记录路由边界上被吸收的 sink 失败
pub fn record_sink_failure(signal: &str, sink_name: &str) {
    counter!(
        "sigroute_sink_failures_total",
        "signal" => signal.to_string(),
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 单次 sink 调用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    Success,
    Failure,
    /// 熔断或限流拒绝
    Rejected,
    /// 超时或取消
    Incomplete,
}

impl SinkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Rejected => "rejected",
            Self::Incomplete => "incomplete",
        }
    }
}

/// 记录 sink 调用结果
pub fn record_sink_outcome(sink_name: &str, outcome: SinkOutcome) {
    counter!(
        "sigroute_sink_calls_total",
        "sink" => sink_name.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// 记录 sink 调用耗时
pub fn record_sink_latency_ms(sink_name: &str, latency_ms: f64) {
    histogram!(
        "sigroute_sink_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// 记录熔断器状态 (0 = closed, 1 = open, 2 = half-open)
pub fn record_circuit_state(sink_name: &str, state: u8) {
    gauge!(
        "sigroute_circuit_state",
        "sink" => sink_name.to_string()
    )
    .set(f64::from(state));
    counter!(
        "sigroute_circuit_transitions_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录限流拒绝
pub fn record_rate_limited(sink_name: &str) {
    counter!(
        "sigroute_rate_limited_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 记录文件轮转
pub fn record_file_rotation(sink_name: &str) {
    counter!(
        "sigroute_file_rotations_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
