use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "query-monitor", version, about = "Query statistics monitor")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the monitor server (default)
    Start,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Print the normalized form and hash of a query
    Normalize {
        /// Raw SQL text
        query: String,
    },

    /// Show the top query shapes from the stats database
    Top {
        /// Sort key: callCount, totalDuration, avgDuration, maxDuration
        #[arg(short, long, default_value = "callCount")]
        order_by: String,

        /// Maximum number of rows
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Window: 1h, 24h, all
        #[arg(short, long, default_value = "all")]
        period: String,
    },

    /// Delete raw query logs older than the retention window now
    Cleanup,

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display the effective configuration
    Show,

    /// Validate configuration file
    Validate,
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}
