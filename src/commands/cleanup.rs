use anyhow::Result;
use colored::Colorize;
use query_monitor::{config, monitor::run_cleanup_now, server::open_database};
use std::path::Path;

/// Execute the cleanup command
pub async fn execute(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let db = open_database(&cfg).await?;
    let policy = cfg.retention.policy();

    println!("{}", "Running cleanup...".bold());
    println!();

    let deleted = run_cleanup_now(&db, &policy).await?;

    println!("{}", "Cleanup Results:".green().bold());
    println!("{:<30} {:>15}", "  Query Logs Deleted:", deleted);

    let remaining = db.counts().await?;
    println!("{:<30} {:>15}", "  Query Logs Remaining:", remaining.log_count);
    println!("{:<30} {:>15}", "  Query Shapes:", remaining.aggregate_count);
    println!();

    if deleted == 0 {
        println!(
            "{}",
            format!("No query logs older than {} day(s)", policy.logs_days).dimmed()
        );
    } else {
        println!("{}", "Cleanup completed successfully!".green().bold());
    }

    db.pool().close().await;
    Ok(())
}
