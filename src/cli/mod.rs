use clap::{Parser, Subcommand};
use std::time::Duration;

pub mod config;
pub mod credentials;
pub mod init_config;
pub mod quorum;
pub mod simulate;
pub mod version;

#[derive(Parser)]
#[command(name = "consortium")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Governance client for replicated ledger consortiums", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full governance lifecycle against an in-process service
    Simulate {
        /// Number of consortium members (default: members listed in the config)
        #[arg(long)]
        members: Option<u32>,

        /// Path to config file (default: ~/.config/consortium/consortium.toml)
        #[arg(long)]
        config: Option<String>,

        /// Polling interval override, e.g. "50ms"
        #[arg(long, value_parser = parse_poll_interval)]
        poll_interval: Option<Duration>,

        /// Commit polls each transaction stays uncommitted for
        #[arg(long, default_value_t = 1)]
        commit_lag: u32,
    },

    /// Check that configured member credentials are readable
    Credentials {
        /// Path to config file (default: ~/.config/consortium/consortium.toml)
        #[arg(long)]
        config: Option<String>,
    },

    /// Print the quorum for a consortium size
    Quorum {
        /// Number of consortium members
        #[arg(long)]
        members: usize,
    },

    /// Write a default config file
    InitConfig {
        /// Output path (default: ~/.config/consortium/consortium.toml)
        #[arg(long)]
        path: Option<String>,

        /// Credentials directory to record in the config
        #[arg(long)]
        credentials_dir: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

/// Poll intervals are whole milliseconds, at least one.
fn parse_poll_interval(input: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(input).map_err(|e| e.to_string())?;
    if interval.is_zero() || interval.subsec_nanos() % 1_000_000 != 0 {
        return Err(format!(
            "'{}' is not a whole number of milliseconds of at least 1ms",
            input
        ));
    }
    Ok(interval)
}

impl Cli {
    /// Config file named on the command line, if any.
    pub fn config_path(&self) -> Option<&str> {
        match &self.command {
            Commands::Simulate { config, .. } | Commands::Credentials { config } => {
                config.as_deref()
            }
            _ => None,
        }
    }
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Simulate {
            members,
            config,
            poll_interval,
            commit_lag,
        } => simulate::execute(members, config, poll_interval, commit_lag).await,
        Commands::Credentials { config } => credentials::execute(config),
        Commands::Quorum { members } => quorum::execute(members),
        Commands::InitConfig {
            path,
            credentials_dir,
            force,
        } => init_config::execute(path, credentials_dir, force),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
