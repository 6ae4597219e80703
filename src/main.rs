use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use bolsa::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display statistics for each configured portfolio
    Analyze,
    /// Run Monte Carlo projections for each configured portfolio
    Simulate,
    /// Generate a Markdown portfolio report
    Report {
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl From<Commands> for bolsa::AppCommand {
    fn from(cmd: Commands) -> bolsa::AppCommand {
        match cmd {
            Commands::Analyze => bolsa::AppCommand::Analyze,
            Commands::Simulate => bolsa::AppCommand::Simulate,
            Commands::Report { output } => bolsa::AppCommand::Report { output },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => bolsa::cli::setup::run(),
        Some(cmd) => bolsa::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
