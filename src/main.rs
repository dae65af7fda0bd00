//! tidyup - pre-commit cleanup of dirty files.

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tidyup::cli;
use tidyup::config::Config;
use tidyup::vcs::GitCli;
use tidyup::Error;

#[derive(Parser)]
#[command(name = "tidyup")]
#[command(about = "tidyup - format dirty files before they are committed")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean up dirty files in this working tree (run by the pre-commit hook)
    Run {
        /// Don't hand the run to a running daemon
        #[arg(long)]
        no_daemon: bool,
    },

    /// Show the dirty files a cleanup run would consider
    Status,

    /// Write project config and install the pre-commit hook
    Init {
        /// Overwrite an existing config with defaults
        #[arg(long, short)]
        force: bool,
    },

    /// Remove the pre-commit hook
    Uninstall,

    /// Run the background daemon that keeps staleness across commits
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let root = std::env::current_dir()
        .ok()
        .and_then(|cwd| GitCli::new().discover_root(&cwd));
    let (config, config_error) = match Config::load(root.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Logs go to stderr; a hook's stdout is for the report.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tidyup={}", config.daemon.log_level)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Some(e) = config_error {
        warn!(error = %e, "Invalid config, using defaults");
    }

    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Run { no_daemon }) => {
            // Must never block a commit.
            if let Err(e) = cli::run::run(root, config, no_daemon).await {
                warn!(error = %e, "Cleanup failed");
            }
        }
        Some(Commands::Status) => {
            cli::status::run(root, &config)?;
        }
        Some(Commands::Init { force }) => {
            cli::init::run(root, force)?;
        }
        Some(Commands::Uninstall) => {
            cli::init::uninstall(root)?;
        }
        Some(Commands::Daemon) => {
            cli::daemon::run(&config).await?;
        }
    }

    Ok(())
}
