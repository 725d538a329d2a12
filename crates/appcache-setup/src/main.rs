use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use appcache_setup::escalate::escalate_if_needed;
use appcache_setup::install::{InstallArgs, InstallPaths, install, uninstall};

/// `AppCache-Lock` service installer.
#[derive(Debug, Parser)]
#[command(name = "appcache-setup", version, about)]
struct Cli {
    /// Run without interactive prompts
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install appcache-lock as a boot-time systemd service
    Install(InstallArgs),
    /// Remove the appcache-lock service, configuration and binary
    Uninstall,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let paths = InstallPaths::default();
    match cli.command {
        Commands::Install(args) => {
            escalate_if_needed("Installing the service", cli.non_interactive)?;
            install(&args, &paths)?;
        }
        Commands::Uninstall => {
            escalate_if_needed("Removing the service", cli.non_interactive)?;
            uninstall(&paths)?;
        }
    }

    Ok(())
}
