//! Config command - View and validate ScriptMirror configuration
//!
//! Provides the `scriptmirror config` CLI command which:
//! 1. Shows the effective configuration with secrets masked (YAML or JSON)
//! 2. Validates the configuration file and reports errors

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use scriptmirror_core::config::Config;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command against the file at `config_path`
    ///
    /// `loaded` is the result of reading that file, so a missing or
    /// unparsable file can still be reported.
    pub async fn execute(
        &self,
        config_path: &Path,
        loaded: Result<Config>,
        format: OutputFormat,
    ) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, loaded, format),
            ConfigCommand::Validate => execute_validate(config_path, loaded, format),
        }
    }
}

fn execute_show(config_path: &Path, loaded: Result<Config>, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let from_file = loaded.is_ok();
    let mut config = loaded.unwrap_or_default();
    config.apply_env_overrides();
    let config = config.redacted();

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    if from_file {
        formatter.success(&format!("Configuration ({})", config_path.display()));
    } else {
        formatter.warn(&format!(
            "No readable configuration at {}, showing defaults",
            config_path.display()
        ));
    }
    formatter.info("");

    let yaml =
        serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
    for line in yaml.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn execute_validate(
    config_path: &Path,
    loaded: Result<Config>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {e:#}")
            } else {
                "Configuration file not found".to_string()
            };

            if format.is_json() {
                formatter.print_json(&json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };
    config.apply_env_overrides();

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(())
}
