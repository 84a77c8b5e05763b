//! wavestate CLI
//!
//! Command-line tools for the wavestate sync engine: replay scripted
//! sessions against an in-memory host and inspect encoded snapshots.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wavestate_core::EngineConfig;

mod commands;
mod output;
mod script;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "wavestate")]
#[command(about = "wavestate - Shared key-value state sync tools")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log engine activity at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted session and print what the application observes
    Replay {
        /// Replay script (JSON)
        script: PathBuf,
    },
    /// Decode a snapshot file and show every key's record
    Decode {
        /// Snapshot file: JSON object of key to encoded value
        snapshot: PathBuf,
        /// Participant list (JSON array) used to resolve participant references
        #[arg(short, long)]
        participants: Option<PathBuf>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print the config file location
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (resolve_forward_references, skip_empty_flush, log_level)
        key: String,
        /// Value to set
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { command } => handle_config_command(command, config_path, &output),
        Commands::Replay { script } => {
            let config = load_config(config_path, cli.verbose)?;
            commands::replay::run(&script, config, &output)
        }
        Commands::Decode {
            snapshot,
            participants,
        } => {
            load_config(config_path, cli.verbose)?;
            commands::decode::run(&snapshot, participants.as_deref(), &output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&Path>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Path) => commands::config::path(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Load configuration and set up logging from it
fn load_config(config_path: Option<&Path>, verbose: bool) -> Result<EngineConfig> {
    let config = EngineConfig::load_with_cli_override(config_path)
        .context("Failed to load configuration")?;
    init_logging(&config, verbose);
    Ok(config)
}

/// Initialize logging to stderr
///
/// `WAVESTATE_LOG` takes a full filter directive and wins over both the
/// config file and `--verbose`.
fn init_logging(config: &EngineConfig, verbose: bool) {
    let log_level = if verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };

    let env_filter = EnvFilter::try_from_env("WAVESTATE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "wavestate_core={},wavestate_cli={}",
            log_level, log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
