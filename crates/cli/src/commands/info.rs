//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{Delivery, DispatchConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    default_delivery: String,
    signals: Vec<SignalInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize, Debug, PartialEq)]
struct SignalInfo {
    signal: String,
    shape: &'static str,
    sinks: Vec<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    /// Innermost first
    adapters: Vec<&'static str>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

/// Replay route registration to find each signal's sinks and shape.
///
/// One sink is Direct; otherwise the delivery of the registration that
/// added the second sink decides, and later registrations only append.
fn routing_table(config: &DispatchConfig) -> Vec<SignalInfo> {
    let mut table: Vec<SignalInfo> = Vec::new();
    for route in &config.routes {
        let delivery = route.delivery.unwrap_or(config.router.delivery);
        let idx = match table.iter().position(|s| s.signal == route.signal) {
            Some(idx) => idx,
            None => {
                table.push(SignalInfo {
                    signal: route.signal.clone(),
                    shape: "direct",
                    sinks: Vec::new(),
                });
                table.len() - 1
            }
        };
        let entry = &mut table[idx];
        for sink in &route.sinks {
            entry.sinks.push(sink.clone());
            if entry.sinks.len() == 2 {
                entry.shape = match delivery {
                    Delivery::Sequential => "sequence",
                    Delivery::Parallel => "fan_out",
                };
            }
        }
    }
    table.sort_by(|a, b| a.signal.cmp(&b.signal));
    table
}

fn build_config_info(config: &DispatchConfig, args: &InfoArgs) -> ConfigInfo {
    let sinks = if args.adapters {
        config
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                adapters: s.adapters.iter().map(|a| a.kind()).collect(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", config.version),
        default_delivery: format!("{:?}", config.router.delivery),
        signals: routing_table(config),
        sinks,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Sigroute Routing Table                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("⚙️  Router");
    println!("   ├─ Version: {}", info.version);
    println!("   └─ Default Delivery: {}", info.default_delivery);

    println!("\n📡 Signals ({})", info.signals.len());
    for (i, signal) in info.signals.iter().enumerate() {
        let is_last = i == info.signals.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        println!(
            "   {} {} [{}] → {}",
            prefix,
            signal.signal,
            signal.shape,
            signal.sinks.join(", ")
        );
    }

    if !info.sinks.is_empty() {
        println!("\n📤 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let is_last = i == info.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if sink.adapters.is_empty() {
                println!("   {} {} ({})", prefix, sink.name, sink.sink_type);
            } else {
                println!(
                    "   {} {} ({}) ← {}",
                    prefix,
                    sink.name,
                    sink.sink_type,
                    sink.adapters.join(" ← ")
                );
            }
        }
    }

    println!();
}
