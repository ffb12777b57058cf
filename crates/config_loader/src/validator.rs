//! 配置校验模块
//!
//! 校验规则：
//! - 结构校验 (validator derive)：名称、signal、路由 sink 列表非空
//! - sink 名称唯一
//! - 路由引用的 sink 已声明
//! - fallback 引用的 sink 在其之前声明，且不是自身
//! - rotating_file 必须提供 path
//! - sampling rate 在 [0, 1] 之间

use std::collections::HashSet;

use contracts::{AdapterConfig, ConfigError, DispatchConfig, SinkType};
use validator::Validate;

/// 校验 DispatchConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &DispatchConfig) -> Result<(), ConfigError> {
    validate_structure(config)?;
    validate_sink_names(config)?;
    validate_sink_params(config)?;
    validate_adapters(config)?;
    validate_routes(config)?;
    Ok(())
}

/// 结构校验
fn validate_structure(config: &DispatchConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|errors| {
        ConfigError::validation("config", errors.to_string().replace('\n', "; "))
    })
}

/// 校验 sink 名称唯一性
fn validate_sink_names(config: &DispatchConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for sink in &config.sinks {
        if !seen.insert(sink.name.as_str()) {
            return Err(ConfigError::validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

/// 校验 sink 类型特定参数
fn validate_sink_params(config: &DispatchConfig) -> Result<(), ConfigError> {
    for sink in &config.sinks {
        if sink.sink_type != SinkType::RotatingFile {
            continue;
        }
        let has_path = sink
            .params
            .get("path")
            .is_some_and(|p| !p.trim().is_empty());
        if !has_path {
            return Err(ConfigError::validation(
                format!("sinks[{}].params.path", sink.name),
                "rotating_file sink requires a path",
            ));
        }
        for key in ["max_bytes", "max_backups"] {
            if let Some(raw) = sink.params.get(key) {
                if raw.trim().parse::<u64>().is_err() {
                    return Err(ConfigError::validation(
                        format!("sinks[{}].params.{key}", sink.name),
                        format!("expected a non-negative integer, got '{raw}'"),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// 校验 adapter 参数与 fallback 引用
fn validate_adapters(config: &DispatchConfig) -> Result<(), ConfigError> {
    let mut declared = HashSet::new();
    for sink in &config.sinks {
        for (idx, adapter) in sink.adapters.iter().enumerate() {
            let field = format!("sinks[{}].adapters[{idx}]", sink.name);
            match adapter {
                AdapterConfig::Fallback { sink: target } => {
                    if target == &sink.name {
                        return Err(ConfigError::validation(
                            field,
                            "fallback cannot reference its own sink",
                        ));
                    }
                    if !declared.contains(target.as_str()) {
                        return Err(ConfigError::validation(
                            field,
                            format!("fallback sink '{target}' must be declared before '{}'", sink.name),
                        ));
                    }
                }
                AdapterConfig::Sampling { rate, .. } if !(0.0..=1.0).contains(rate) => {
                    return Err(ConfigError::validation(
                        field,
                        format!("sampling rate must be within [0, 1], got {rate}"),
                    ));
                }
                AdapterConfig::RateLimit { rps, .. } if !rps.is_finite() || *rps <= 0.0 => {
                    return Err(ConfigError::validation(
                        field,
                        format!("rps must be > 0, got {rps}"),
                    ));
                }
                _ => {}
            }
        }
        declared.insert(sink.name.as_str());
    }
    Ok(())
}

/// 校验路由引用
fn validate_routes(config: &DispatchConfig) -> Result<(), ConfigError> {
    let declared: HashSet<&str> = config.sinks.iter().map(|s| s.name.as_str()).collect();
    for route in &config.routes {
        for sink in &route.sinks {
            if !declared.contains(sink.as_str()) {
                return Err(ConfigError::validation(
                    format!("routes[{}].sinks", route.signal),
                    format!("unknown sink '{sink}'"),
                ));
            }
        }
    }
    Ok(())
}
