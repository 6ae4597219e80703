pub mod cli;
pub mod config;
pub mod core;
pub mod providers;

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

/// Commands the binary dispatches into the library.
pub enum AppCommand {
    Analyze,
    Simulate,
    Report { output: Option<PathBuf> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Analyze => cli::analyze::run(&config).await,
        AppCommand::Simulate => cli::simulate::run(&config).await,
        AppCommand::Report { output } => cli::report::run(&config, output.as_deref()).await,
    }
}
