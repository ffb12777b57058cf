//! `validate` command implementation.

use std::collections::HashSet;

use anyhow::{Context, Result};
use contracts::DispatchConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    delivery: String,
    sink_count: usize,
    route_count: usize,
    adapter_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    delivery: format!("{:?}", config.router.delivery),
                    sink_count: config.sinks.len(),
                    route_count: config.routes.len(),
                    adapter_count: config.sinks.iter().map(|s| s.adapters.len()).sum(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &DispatchConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.routes.is_empty() {
        warnings.push("No routes configured - every emitted event will be dropped".to_string());
    }

    let mut referenced: HashSet<&str> = config
        .routes
        .iter()
        .flat_map(|r| r.sinks.iter().map(String::as_str))
        .collect();
    for sink in &config.sinks {
        for adapter in &sink.adapters {
            if let contracts::AdapterConfig::Fallback { sink: secondary } = adapter {
                referenced.insert(secondary.as_str());
            }
        }
    }
    for sink in &config.sinks {
        if !referenced.contains(sink.name.as_str()) {
            warnings.push(format!(
                "Sink '{}' is not used by any route or fallback",
                sink.name
            ));
        }
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !seen.insert(route.signal.as_str()) {
            warnings.push(format!(
                "Signal '{}' has several route entries; sinks are appended in order",
                route.signal
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Delivery: {}", summary.delivery);
            println!("  Sinks: {}", summary.sink_count);
            println!("  Routes: {}", summary.route_count);
            println!("  Adapters: {}", summary.adapter_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_unused_sink_warning() {
        let file = write_config(
            r#"
[[sinks]]
name = "console"
sink_type = "log"

[[sinks]]
name = "spare"
sink_type = "log"

[[routes]]
signal = "ORDER_PLACED"
sinks = ["console"]
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };

        let result = validate_config(&args);

        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("spare"));
        assert_eq!(result.summary.unwrap().route_count, 1);
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let file = write_config(
            r#"
[[routes]]
signal = "ORDER_PLACED"
sinks = ["missing"]
"#,
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let result = validate_config(&args);

        assert!(!result.valid);
        assert!(result.error.unwrap().contains("missing"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "/nonexistent/sigroute.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().starts_with("File not found"));
    }
}
