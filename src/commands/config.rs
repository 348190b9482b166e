use anyhow::Result;
use colored::Colorize;
use query_monitor::config;
use std::path::Path;
use tracing::info;

/// Execute the config show command
///
/// Displays the effective configuration (file, env overrides and defaults)
pub fn show(config_path: &Path) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config(config_path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&cfg)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(config_path: &Path) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration file");

    let cfg = config::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!("  Database: {}", cfg.database.path);
    println!("  API Prefix: {}", cfg.api.prefix);
    println!(
        "  Collector: {} (slow >= {}ms)",
        enabled_label(cfg.collector.enabled),
        cfg.collector.slow_query_threshold_ms
    );
    println!(
        "  Flush: every {}ms or {} queries",
        cfg.collector.flush_delay_ms, cfg.collector.flush_batch_size
    );
    println!(
        "  Retention: {} ({} days, at {:02}:00)",
        enabled_label(cfg.retention.enabled),
        cfg.retention.logs_days,
        cfg.retention.cleanup_hour
    );

    info!("Configuration validation successful");
    Ok(())
}

fn enabled_label(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
