use colored::Colorize;
use query_monitor::monitor::{hash_query, normalize_query, references_own_tables};

/// Execute the normalize command
///
/// Prints the shape a query would be aggregated under.
pub fn execute(query: &str) {
    let normalized = normalize_query(query);

    println!("{} {}", "Normalized:".bold(), normalized.cyan());
    println!("{} {}", "Hash:".bold(), hash_query(&normalized));

    if references_own_tables(query) {
        println!(
            "{}",
            "Note: this query references monitor tables and would not be recorded".yellow()
        );
    }
}
