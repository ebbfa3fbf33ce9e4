mod commands;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleetscale")]
#[command(about = "Declare auto-scaling VM fleets from fleet.kdl", long_about = None)]
struct Cli {
    /// Configuration file (default: discovered from the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration without declaring anything
    Validate,
    /// Render the declared resources as a CloudFormation template
    Synth {
        /// Write the template to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show what would change compared to the last apply
    Plan,
    /// Record the declared resources and write the template
    Apply,
    /// Print the key retrieval command of each fleet
    Output {
        /// Only this fleet
        fleet: Option<String>,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries templates and commands, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("fleetscale {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = utils::resolve_config_path(cli.config)?;
    tracing::debug!("Using configuration {}", config_path.display());

    match cli.command {
        Commands::Validate => commands::validate::handle(&config_path).await?,
        Commands::Synth { out } => commands::synth::handle(&config_path, out.as_deref()).await?,
        Commands::Plan => commands::plan::handle(&config_path).await?,
        Commands::Apply => commands::apply::handle(&config_path).await?,
        Commands::Output { fleet } => {
            commands::output::handle(&config_path, fleet.as_deref()).await?
        }
        Commands::Version => unreachable!("Version is handled before config loading"),
    }

    Ok(())
}
