//! settle CLI - hold new files until their writers let go

use anyhow::Result;
use clap::{Parser, Subcommand};
use settle_core::IdentityMode;
use std::path::PathBuf;

mod action;
mod cmd;
mod logging;
mod system_config;
mod util;

/// settle - act on new files only once they are no longer being written
#[derive(Parser)]
#[command(name = "settle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/settle/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and report files once they are safe to process
    Watch {
        /// Directory to watch
        dir: PathBuf,
        /// Seconds to wait after creation, and between retries
        #[arg(long)]
        debounce_secs: Option<u64>,
        /// Retries allowed after the first locked probe
        #[arg(long)]
        max_retries: Option<u32>,
        /// Entry key: full-path or file-name
        #[arg(long)]
        identity: Option<IdentityMode>,
        /// Watch subdirectories too
        #[arg(short, long)]
        recursive: bool,
        /// Move safe files into this directory
        #[arg(long)]
        move_to: Option<PathBuf>,
        /// Move failed files into this directory
        #[arg(long)]
        failed_to: Option<PathBuf>,
        /// Print one JSON line per outcome on stdout
        #[arg(long)]
        json: bool,
    },
    /// Check whether files are currently locked by another process
    Probe {
        /// Files to probe
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Inspect or edit the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List all values
    List,
    /// Print one value
    Get {
        /// Key such as settle.max_retries
        key: String,
    },
    /// Change one value
    Set {
        /// Key such as settle.max_retries
        key: String,
        /// New value (empty string clears optional paths)
        value: String,
    },
    /// Show the config file location
    Path {
        /// Create the file with example contents if missing
        #[arg(long)]
        create: bool,
    },
    /// Print an annotated example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Watch {
            dir,
            debounce_secs,
            max_retries,
            identity,
            recursive,
            move_to,
            failed_to,
            json,
        } => {
            let args = cmd::watch::WatchArgs {
                dir,
                debounce_secs,
                max_retries,
                identity,
                recursive,
                move_to,
                failed_to,
                json,
            };
            let config = args.apply(system_config::load(config_path)?)?;

            let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
            let _guard = logging::init(level, config.logging.file.as_deref())?;

            cmd::watch::run(args, config).await
        }
        Commands::Probe { paths, json } => {
            let _guard = logging::init(cli.log_level.as_deref().unwrap_or("warn"), None)?;
            cmd::probe::run(&paths, json).await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::List => cmd::config::run_list(config_path).await,
            ConfigCommands::Get { key } => cmd::config::run_get(config_path, &key).await,
            ConfigCommands::Set { key, value } => {
                cmd::config::run_set(config_path, &key, &value).await
            }
            ConfigCommands::Path { create } => cmd::config::run_path(config_path, create).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}
