use anyhow::Result;
use colored::Colorize;
use query_monitor::{config, init_tracing, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Loads the configuration, initializes logging in the configured format
/// and runs the server until a shutdown signal arrives.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting query monitor...".green());

    let cfg = config::load_config(config_path)?;
    init_tracing(&cfg.server.log_format);

    info!(config = %config_path.display(), "Configuration loaded");

    server::start_server(cfg, config_path.to_path_buf()).await?;

    Ok(())
}
