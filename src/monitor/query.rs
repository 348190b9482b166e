//! Read-side types for query statistics
//!
//! Row shapes returned by the store and the request options that select them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted observation (`query_logs` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogEntry {
    pub id: i64,
    pub query_hash: String,
    pub query_normalized: String,
    pub duration_ms: u64,
    pub rows_affected: Option<u64>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Running aggregate for one query shape (`query_stats` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatsAggregate {
    pub id: i64,
    pub query_hash: String,
    pub query_normalized: String,
    pub call_count: u64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
    pub min_duration_ms: u64,
    pub last_called_at: DateTime<Utc>,
}

/// Aggregate-of-aggregates for the dashboard header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySummary {
    pub total_queries: u64,
    pub unique_queries: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
    pub slow_queries_count: u64,
    pub slow_query_threshold_ms: u64,
}

/// Ordering for the top-queries listing. Always descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatsOrder {
    #[default]
    CallCount,
    AvgDuration,
    TotalDuration,
    MaxDuration,
}

impl StatsOrder {
    /// Parse the API value; anything unrecognized falls back to call count.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("avgDuration") => Self::AvgDuration,
            Some("totalDuration") => Self::TotalDuration,
            Some("maxDuration") => Self::MaxDuration,
            _ => Self::CallCount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CallCount => "callCount",
            Self::AvgDuration => "avgDuration",
            Self::TotalDuration => "totalDuration",
            Self::MaxDuration => "maxDuration",
        }
    }

    /// ORDER BY column for `query_stats`
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::CallCount => "call_count",
            Self::AvgDuration => "avg_duration_ms",
            Self::TotalDuration => "total_duration_ms",
            Self::MaxDuration => "max_duration_ms",
        }
    }
}

/// Coarse time window applied to reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Period {
    LastHour,
    LastDay,
    #[default]
    All,
}

impl Period {
    /// Parse the API value (`1h`, `24h`, `all`); unknown values mean all time.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("1h") => Self::LastHour,
            Some("24h") => Self::LastDay,
            _ => Self::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastHour => "1h",
            Self::LastDay => "24h",
            Self::All => "all",
        }
    }

    /// Earliest Unix millisecond timestamp inside the window, if bounded
    pub fn cutoff_millis(&self, now_ms: i64) -> Option<i64> {
        match self {
            Self::LastHour => Some(now_ms - 60 * 60 * 1000),
            Self::LastDay => Some(now_ms - 24 * 60 * 60 * 1000),
            Self::All => None,
        }
    }
}

/// Options for the top-queries listing
#[derive(Debug, Clone, Copy)]
pub struct StatsQuery {
    pub order_by: StatsOrder,
    pub limit: u32,
    pub period: Period,
}

impl Default for StatsQuery {
    fn default() -> Self {
        Self {
            order_by: StatsOrder::default(),
            limit: 50,
            period: Period::default(),
        }
    }
}

/// Options for the slow-query listing
#[derive(Debug, Clone, Copy)]
pub struct SlowQueryFilter {
    pub threshold_ms: u64,
    pub limit: u32,
    pub period: Period,
}

impl Default for SlowQueryFilter {
    fn default() -> Self {
        Self {
            threshold_ms: 100,
            limit: 50,
            period: Period::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_order_parse() {
        assert_eq!(StatsOrder::parse_lenient(None), StatsOrder::CallCount);
        assert_eq!(StatsOrder::parse_lenient(Some("avgDuration")), StatsOrder::AvgDuration);
        assert_eq!(StatsOrder::parse_lenient(Some("maxDuration")), StatsOrder::MaxDuration);
        assert_eq!(StatsOrder::parse_lenient(Some("bogus")), StatsOrder::CallCount);
    }

    #[test]
    fn test_period_cutoff() {
        let now = 10 * 24 * 60 * 60 * 1000;
        assert_eq!(Period::All.cutoff_millis(now), None);
        assert_eq!(Period::LastHour.cutoff_millis(now), Some(now - 3_600_000));
        assert_eq!(Period::LastDay.cutoff_millis(now), Some(now - 86_400_000));
        assert_eq!(Period::parse_lenient(Some("7d")), Period::All);
    }

    #[test]
    fn test_aggregate_serializes_camel_case() {
        let row = QueryStatsAggregate {
            id: 1,
            query_hash: "abcd".to_string(),
            query_normalized: "SELECT ?".to_string(),
            call_count: 2,
            total_duration_ms: 30,
            avg_duration_ms: 15.0,
            max_duration_ms: 20,
            min_duration_ms: 10,
            last_called_at: DateTime::from_timestamp_millis(0).unwrap(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["callCount"], 2);
        assert_eq!(json["avgDurationMs"], 15.0);
        assert!(json.get("lastCalledAt").is_some());
    }
}
