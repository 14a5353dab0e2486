//! Config command - show and validate the YAML configuration

use anyhow::{Context, Result};
use clap::Subcommand;
use filen_core::config::Config;
use tracing::info;

use crate::commands::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => show(ctx, format),
            ConfigCommand::Validate => validate(ctx, format),
        }
    }
}

fn show(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&ctx.config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
        return Ok(());
    }

    formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
    formatter.info("");
    let yaml =
        serde_yaml::to_string(&ctx.config).context("Failed to serialize configuration to YAML")?;
    for line in yaml.lines() {
        formatter.info(line);
    }
    Ok(())
}

fn validate(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    // Load explicitly so parse errors are reported instead of defaulted
    let config = match Config::load(&ctx.config_path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": ctx.config_path.display().to_string(),
                    "errors": [e.to_string()],
                }));
            } else {
                formatter.error(&format!(
                    "Cannot load {}: {e}",
                    ctx.config_path.display()
                ));
            }
            return Ok(());
        }
    };

    let errors: Vec<String> = config.validate().iter().map(ToString::to_string).collect();
    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": ctx.config_path.display().to_string(),
            "errors": errors,
        }));
    } else if errors.is_empty() {
        formatter.success(&format!("{} is valid", ctx.config_path.display()));
    } else {
        formatter.error(&format!("{} has {} error(s):", ctx.config_path.display(), errors.len()));
        for error in &errors {
            formatter.info(&format!("  {error}"));
        }
    }
    Ok(())
}
