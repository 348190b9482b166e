use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use query_monitor::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // The server picks its log format from config; other commands log text
    if !matches!(args.get_command(), cli::Commands::Start) {
        init_tracing("text");
    }

    match args.get_command() {
        cli::Commands::Start => {
            commands::start::execute(&args.config).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Normalize { query } => {
            commands::normalize::execute(&query);
        }
        cli::Commands::Top { order_by, limit, period } => {
            commands::top::execute(&args.config, &order_by, limit, &period).await?;
        }
        cli::Commands::Cleanup => {
            commands::cleanup::execute(&args.config).await?;
        }
        cli::Commands::Version => {
            println!("Query Monitor v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
