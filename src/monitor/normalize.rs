//! Query text normalization and hashing
//!
//! Two executions of the same statement that differ only in literal values
//! or whitespace must normalize to the same text, and therefore to the same
//! hash. The hash is the grouping key for `query_stats`.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Maximum length (in characters) of a normalized query
pub const MAX_NORMALIZED_LEN: usize = 500;

/// Length of the hex digest prefix used as the aggregation key
pub const QUERY_HASH_LEN: usize = 16;

/// Tables owned by the monitor itself. Queries touching them are never recorded.
pub const OWN_TABLES: [&str; 2] = ["query_logs", "query_stats"];

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static POSITIONAL_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+").unwrap());
static STRING_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'[^']*'").unwrap());
static NUMERIC_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\b").unwrap());

/// Normalize a raw query into its grouping form.
///
/// Steps run in a fixed order: whitespace collapse, `$N` placeholders,
/// quoted literals, then numeric literals. Quoted literals must be replaced
/// before numbers so digits inside strings are not substituted on their own.
///
/// # Example
///
/// ```
/// use query_monitor::monitor::normalize_query;
///
/// assert_eq!(
///     normalize_query("SELECT *  FROM t WHERE id = 42 AND name = 'bob'"),
///     "SELECT * FROM t WHERE id = ? AND name = '?'"
/// );
/// ```
pub fn normalize_query(raw: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw, " ");
    let params = POSITIONAL_PARAM_RE.replace_all(&collapsed, "?");
    let literals = STRING_LITERAL_RE.replace_all(&params, "'?'");
    let numbers = NUMERIC_LITERAL_RE.replace_all(&literals, "?");

    let trimmed = numbers.trim();
    match trimmed.char_indices().nth(MAX_NORMALIZED_LEN) {
        // Re-trim so a cut landing on a space stays a fixed point
        Some((byte_idx, _)) => trimmed[..byte_idx].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Short, stable digest of a normalized query.
///
/// This is an aggregation key, not a security boundary: the 64-bit prefix
/// accepts a small collision risk in exchange for compact rows.
pub fn hash_query(normalized: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(normalized.as_bytes()));
    digest[..QUERY_HASH_LEN].to_string()
}

/// Whether a raw query targets the monitor's own storage tables.
pub fn references_own_tables(raw: &str) -> bool {
    OWN_TABLES.iter().any(|table| raw.contains(table))
}
