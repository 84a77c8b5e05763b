//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use wavestate_core::EngineConfig;

use crate::output::{Output, OutputFormat};

fn effective_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(EngineConfig::config_file_path)
}

/// Show current configuration
pub fn show(config_path: Option<&Path>, output: &Output) -> Result<()> {
    let config = EngineConfig::load_with_cli_override(config_path)
        .context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "resolve_forward_references": config.resolve_forward_references,
                    "skip_empty_flush": config.skip_empty_flush,
                    "log_level": config.log_level,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", effective_path(config_path).display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!(
                "  resolve_forward_references: {}",
                config.resolve_forward_references
            );
            println!("  skip_empty_flush:           {}", config.skip_empty_flush);
            println!("  log_level:                  {}", config.log_level);
            println!();
            println!("Config file: {}", effective_path(config_path).display());
        }
    }

    Ok(())
}

/// Print the config file location
pub fn path(config_path: Option<&Path>, output: &Output) -> Result<()> {
    let path = effective_path(config_path);
    match output.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "path": path })),
        _ => println!("{}", path.display()),
    }
    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let mut config = EngineConfig::load_with_cli_override(config_path)
        .context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;

    config
        .save_to_path(&effective_path(config_path))
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut EngineConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "resolve_forward_references" => {
            config.resolve_forward_references = value
                .parse()
                .context("Invalid value for resolve_forward_references. Use 'true' or 'false'.")?;
        }
        "skip_empty_flush" => {
            config.skip_empty_flush = value
                .parse()
                .context("Invalid value for skip_empty_flush. Use 'true' or 'false'.")?;
        }
        "log_level" => {
            config.log_level = value.to_string();
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: resolve_forward_references, skip_empty_flush, log_level",
                key
            );
        }
    }
    Ok(())
}
