//! Top queries command
//!
//! Reads the stats database directly and prints the aggregates as a table,
//! followed by the summary line the dashboard shows.

use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};
use query_monitor::{
    config,
    monitor::{Period, QueryStatsAggregate, StatsOrder, StatsQuery},
    server::open_database,
};
use std::path::Path;

const QUERY_COLUMN_CHARS: usize = 80;

/// Execute the top command
pub async fn execute(config_path: &Path, order_by: &str, limit: u32, period: &str) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let db = open_database(&cfg).await?;

    let query = StatsQuery {
        order_by: StatsOrder::parse_lenient(Some(order_by)),
        limit: limit.max(1),
        period: Period::parse_lenient(Some(period)),
    };

    let stats = db.top_queries(query).await?;
    let summary = db
        .summary(query.period, cfg.collector.slow_query_threshold_ms)
        .await?;
    db.pool().close().await;

    println!(
        "{}",
        format!(
            "Top Queries by {} ({})",
            query.order_by.as_str(),
            query.period.as_str()
        )
        .bold()
        .underline()
    );
    println!();

    if stats.is_empty() {
        println!("{}", "No query stats recorded yet".yellow());
        return Ok(());
    }

    println!("{}", render_table(&stats, cfg.collector.slow_query_threshold_ms));
    println!();
    println!(
        "{} {}   {} {}   {} {:.1}ms   {} {}ms   {} {}",
        "Calls:".bold(),
        summary.total_queries,
        "Shapes:".bold(),
        summary.unique_queries,
        "Avg:".bold(),
        summary.avg_duration_ms,
        "Max:".bold(),
        summary.max_duration_ms,
        "Slow:".bold(),
        summary.slow_queries_count.to_string().red()
    );

    Ok(())
}

fn render_table(stats: &[QueryStatsAggregate], slow_threshold_ms: u64) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("QUERY").fg(Color::Cyan),
        Cell::new("CALLS").fg(Color::Cyan),
        Cell::new("TOTAL").fg(Color::Cyan),
        Cell::new("AVG").fg(Color::Cyan),
        Cell::new("MIN").fg(Color::Cyan),
        Cell::new("MAX").fg(Color::Cyan),
        Cell::new("LAST CALLED").fg(Color::Cyan),
    ]);

    for stat in stats {
        let avg = Cell::new(format!("{:.1}ms", stat.avg_duration_ms))
            .set_alignment(CellAlignment::Right);
        let avg = if stat.avg_duration_ms >= slow_threshold_ms as f64 {
            avg.fg(Color::Red)
        } else {
            avg
        };

        table.add_row(vec![
            Cell::new(truncate_query(&stat.query_normalized)),
            Cell::new(stat.call_count).set_alignment(CellAlignment::Right),
            Cell::new(format!("{}ms", stat.total_duration_ms)).set_alignment(CellAlignment::Right),
            avg,
            Cell::new(format!("{}ms", stat.min_duration_ms)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{}ms", stat.max_duration_ms)).set_alignment(CellAlignment::Right),
            Cell::new(stat.last_called_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    table
}

fn truncate_query(query: &str) -> String {
    if query.chars().count() <= QUERY_COLUMN_CHARS {
        query.to_string()
    } else {
        let head: String = query.chars().take(QUERY_COLUMN_CHARS - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_query() {
        assert_eq!(truncate_query("SELECT ?"), "SELECT ?");

        let long = "a".repeat(120);
        let truncated = truncate_query(&long);
        assert_eq!(truncated.chars().count(), QUERY_COLUMN_CHARS);
        assert!(truncated.ends_with("..."));
    }
}
