use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;

mod config;
mod logging;
mod runner;

use config::{AppConfig, LogSettings};

#[derive(Parser)]
#[command(name = "regsync")]
#[command(about = "Synchronizes relying-party clients from a participant directory into a federation server")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "regsync.toml")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation pass
    Run {
        /// Keep running, one pass per configured interval
        #[arg(long)]
        repeat: bool,
    },
    /// Show the actions a pass would take, without applying them
    Plan,
    /// Probe connectivity to the directory and the target server
    Check,
    /// Delete directory-managed clients from the target server
    Purge {
        /// Delete every client, including manually created ones
        #[arg(long)]
        all: bool,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Subcommand)]
enum ConfigActions {
    /// Validate the configuration file
    Validate,
    /// Show the loaded configuration
    Show,
    /// Generate a default configuration
    Generate {
        /// Output path for the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { repeat } => {
            let (config, _guard) = load_settings(&cli.config, cli.log_level.as_deref()).await?;
            runner::run(&config, repeat).await
        }
        Commands::Plan => {
            let (config, _guard) = load_settings(&cli.config, cli.log_level.as_deref()).await?;
            runner::print_plan(&config).await
        }
        Commands::Check => {
            let (config, _guard) = load_settings(&cli.config, cli.log_level.as_deref()).await?;
            runner::check(&config).await
        }
        Commands::Purge { all, yes } => {
            let (config, _guard) = load_settings(&cli.config, cli.log_level.as_deref()).await?;
            runner::purge(&config, all, yes).await
        }
        Commands::Config { action } => match action {
            ConfigActions::Validate => validate_config(&cli.config, cli.log_level.as_deref()).await,
            ConfigActions::Show => show_config(&cli.config).await,
            ConfigActions::Generate { output } => generate_config(output.as_ref()).await,
        },
    }
}

/// Loads the configuration and installs the subscriber it asks for.
async fn load_settings(
    path: &PathBuf,
    log_level: Option<&str>,
) -> Result<(AppConfig, Option<WorkerGuard>)> {
    let mut config = AppConfig::load(path).await?;
    if let Some(level) = log_level {
        config.log.level = level.to_string();
    }
    let guard = logging::init(&config.log)?;
    Ok((config, guard))
}

async fn validate_config(path: &PathBuf, log_level: Option<&str>) -> Result<()> {
    // Console-only logging so validation warnings are visible.
    let mut log = LogSettings::default();
    if let Some(level) = log_level {
        log.level = level.to_string();
    }
    let _guard = logging::init(&log)?;

    let config = match AppConfig::load(path).await {
        Ok(config) => config,
        Err(e) => {
            println!("✗ Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    match config.validate() {
        Ok(()) => {
            println!("✓ Configuration is valid");
            println!("Directory issuer: {}", config.directory.issuer);
            println!("Admin endpoint: {}", config.target.admin_base_url);
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration validation failed: {}", e);
            Err(e)
        }
    }
}

async fn show_config(path: &PathBuf) -> Result<()> {
    let config = AppConfig::load(path).await?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

async fn generate_config(output: Option<&PathBuf>) -> Result<()> {
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config)?;

    if let Some(path) = output {
        tokio::fs::write(path, content).await?;
        println!("Configuration written to {}", path.display());
    } else {
        println!("{}", content);
    }

    Ok(())
}
