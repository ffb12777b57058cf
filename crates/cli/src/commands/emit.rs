//! `emit` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use contracts::Field;
use tracing::{info, warn};

use crate::cli::EmitArgs;
use crate::error::{self, CliError};

/// Execute the `emit` command
pub async fn run_emit(args: &EmitArgs) -> Result<()> {
    info!(config = %args.config.display(), signal = %args.signal, "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let fields = args
        .fields
        .iter()
        .map(|arg| parse_field(arg))
        .collect::<error::Result<Vec<_>>>()?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let dispatcher =
        dispatcher::create_dispatcher(config).context("Failed to build dispatcher")?;
    let logger = dispatcher.logger();

    let sink_count = logger.sink_count(&args.signal);
    if sink_count == 0 {
        warn!(signal = %args.signal, "No sinks registered for signal, events will be dropped");
    }

    let start = Instant::now();
    for _ in 0..args.count {
        logger
            .emit(args.signal.as_str(), args.message.as_str(), fields.clone())
            .await;
    }
    let elapsed = start.elapsed();

    dispatcher
        .shutdown()
        .await
        .context("Failed to shut down sinks")?;

    info!(
        count = args.count,
        sinks = sink_count,
        elapsed_ms = elapsed.as_millis() as u64,
        "Emit complete"
    );

    println!(
        "✓ Emitted {} event(s) on '{}' to {} sink(s) in {:.2}ms",
        args.count,
        args.signal,
        sink_count,
        elapsed.as_secs_f64() * 1000.0
    );
    for (name, snapshot) in dispatcher.metrics() {
        println!(
            "   {} ok={} failed={} rejected={} incomplete={} latency: {}",
            name,
            snapshot.success_count,
            snapshot.failure_count,
            snapshot.rejected_count,
            snapshot.incomplete_count,
            snapshot.latency_ms
        );
    }

    Ok(())
}

/// Parse `KEY=VALUE`, inferring int, float, bool, then string.
fn parse_field(arg: &str) -> error::Result<Field> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| CliError::invalid_field(arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::empty_field_key(arg));
    }

    if let Ok(value) = raw.parse::<i64>() {
        return Ok(Field::int64(key, value));
    }
    // "inf" and "NaN" parse as floats but are meant as text here
    if let Ok(value) = raw.parse::<f64>() {
        if value.is_finite() {
            return Ok(Field::float64(key, value));
        }
    }
    if let Ok(value) = raw.parse::<bool>() {
        return Ok(Field::bool(key, value));
    }
    Ok(Field::string(key, raw))
}
