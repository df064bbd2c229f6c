use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use rmon_core::config::Settings;

use crate::logging::{self, LogFormat};
use crate::setup;

#[derive(Parser)]
#[command(
    name = "rmon-setup",
    version,
    about = "Provision a Raspberry Pi as an RMON monitoring node"
)]
struct Cli {
    /// Settings file (TOML). Defaults to $RMON_SETUP_CONFIG, then /etc/rmon-setup.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full provisioning pipeline (default)
    Setup,
    /// Print the effective settings as TOML and exit
    Config,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogFormat::from_env());

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Setup) {
        Commands::Setup => setup::run_setup(&settings),
        Commands::Config => cmd_config(&settings),
    }
}

fn cmd_config(settings: &Settings) -> Result<()> {
    print!("{}", settings.to_toml()?);
    Ok(())
}
