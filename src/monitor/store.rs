//! SQLite persistence for query statistics
//!
//! This module owns the two monitor tables:
//! - `query_logs`: one immutable row per flushed observation
//! - `query_stats`: one running aggregate per query hash, maintained by upsert
//!
//! Timestamps are stored as Unix milliseconds and set at flush time.

use super::query::{
    Period, QueryLogEntry, QueryStatsAggregate, QuerySummary, SlowQueryFilter, StatsQuery,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

/// A buffered observation waiting to be flushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub query_hash: String,
    pub query_normalized: String,
    pub duration_ms: u64,
    pub rows_affected: Option<u64>,
    pub source: Option<String>,
}

/// Row counts for both monitor tables
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub log_count: u64,
    pub aggregate_count: u64,
}

const INSERT_LOG_SQL: &str = r#"
    INSERT INTO query_logs (query_hash, query_normalized, duration_ms, rows_affected, source, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

// SET expressions see the pre-update row, so avg uses the old total and count.
// The running total saturates at i64::MAX instead of spilling into REAL.
const UPSERT_STATS_SQL: &str = r#"
    INSERT INTO query_stats (
        query_hash, query_normalized, call_count, total_duration_ms,
        avg_duration_ms, max_duration_ms, min_duration_ms, last_called_at
    ) VALUES (?1, ?2, 1, ?3, ?3, ?3, ?3, ?4)
    ON CONFLICT(query_hash) DO UPDATE SET
        call_count = call_count + 1,
        total_duration_ms = CASE
            WHEN total_duration_ms > 9223372036854775807 - excluded.total_duration_ms
                THEN 9223372036854775807
            ELSE total_duration_ms + excluded.total_duration_ms
        END,
        avg_duration_ms = CAST(CASE
            WHEN total_duration_ms > 9223372036854775807 - excluded.total_duration_ms
                THEN 9223372036854775807
            ELSE total_duration_ms + excluded.total_duration_ms
        END AS REAL) / (call_count + 1),
        max_duration_ms = MAX(max_duration_ms, excluded.max_duration_ms),
        min_duration_ms = MIN(min_duration_ms, excluded.min_duration_ms),
        last_called_at = excluded.last_called_at
"#;

const STATS_COLUMNS: &str = "id, query_hash, query_normalized, call_count, total_duration_ms, \
     avg_duration_ms, max_duration_ms, min_duration_ms, last_called_at";

/// Query statistics database handle
pub struct QueryStatsDb {
    pool: SqlitePool,
}

impl QueryStatsDb {
    /// Open (creating if needed) the database and run migrations
    ///
    /// # Example
    ///
    /// ```ignore
    /// let db = QueryStatsDb::new("sqlite:./data/query_monitor.db", 5).await?;
    /// ```
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
            .pragma("synchronous", "NORMAL");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to query monitor database {}", database_url))?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database, used by tests and `--ephemeral` runs
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every in-memory connection is its own database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory query monitor database")?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .context("Failed to run query monitor migrations")?;

        tracing::debug!("Query monitor migrations completed");
        Ok(())
    }

    /// Persist a drained batch, stamping rows with the current time
    pub async fn persist_batch(&self, batch: &[PendingQuery]) -> Result<()> {
        self.persist_batch_at(batch, Utc::now().timestamp_millis()).await
    }

    /// Persist a drained batch in one transaction.
    ///
    /// Records are applied in buffer order; each log insert precedes the
    /// aggregate upsert for the same record. Any failure rolls back the
    /// whole batch.
    pub async fn persist_batch_at(&self, batch: &[PendingQuery], now_ms: i64) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for record in batch {
            sqlx::query(INSERT_LOG_SQL)
                .bind(&record.query_hash)
                .bind(&record.query_normalized)
                .bind(sql_int(record.duration_ms))
                .bind(record.rows_affected.map(sql_int))
                .bind(&record.source)
                .bind(now_ms)
                .execute(&mut *tx)
                .await
                .context("Failed to insert query log")?;

            sqlx::query(UPSERT_STATS_SQL)
                .bind(&record.query_hash)
                .bind(&record.query_normalized)
                .bind(sql_int(record.duration_ms))
                .bind(now_ms)
                .execute(&mut *tx)
                .await
                .context("Failed to upsert query stats")?;
        }

        tx.commit().await.context("Failed to commit query log batch")?;

        Ok(())
    }

    /// Top query shapes by the requested ordering
    pub async fn top_queries(&self, query: StatsQuery) -> Result<Vec<QueryStatsAggregate>> {
        let cutoff = query.period.cutoff_millis(Utc::now().timestamp_millis());
        let sql = format!(
            "SELECT {} FROM query_stats
             WHERE (?1 IS NULL OR last_called_at >= ?1)
             ORDER BY {} DESC, id ASC
             LIMIT ?2",
            STATS_COLUMNS,
            query.order_by.column()
        );

        let rows = sqlx::query(&sql)
            .bind(cutoff)
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await
            .context("Failed to query top queries")?;

        rows.iter().map(aggregate_from_row).collect()
    }

    /// Aggregate row for one hash, if present
    pub async fn aggregate_for_hash(&self, query_hash: &str) -> Result<Option<QueryStatsAggregate>> {
        let sql = format!("SELECT {} FROM query_stats WHERE query_hash = ?1", STATS_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(query_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(aggregate_from_row).transpose()
    }

    /// Most recent log rows at or above the threshold
    pub async fn slow_queries(&self, filter: SlowQueryFilter) -> Result<Vec<QueryLogEntry>> {
        let cutoff = filter.period.cutoff_millis(Utc::now().timestamp_millis());

        let rows = sqlx::query(
            "SELECT id, query_hash, query_normalized, duration_ms, rows_affected, source, created_at
             FROM query_logs
             WHERE duration_ms >= ?1 AND (?2 IS NULL OR created_at >= ?2)
             ORDER BY created_at DESC, id DESC
             LIMIT ?3",
        )
        .bind(sql_int(filter.threshold_ms))
        .bind(cutoff)
        .bind(i64::from(filter.limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query slow queries")?;

        rows.iter().map(log_from_row).collect()
    }

    /// Summary across aggregates (windowed on `last_called_at`) plus the
    /// slow log count (windowed on `created_at`)
    pub async fn summary(&self, period: Period, slow_threshold_ms: u64) -> Result<QuerySummary> {
        let cutoff = period.cutoff_millis(Utc::now().timestamp_millis());

        let (total_queries, unique_queries, avg_duration, max_duration) =
            sqlx::query_as::<_, (i64, i64, f64, i64)>(
                "SELECT COALESCE(SUM(call_count), 0),
                        COUNT(*),
                        COALESCE(AVG(avg_duration_ms), 0.0),
                        COALESCE(MAX(max_duration_ms), 0)
                 FROM query_stats
                 WHERE (?1 IS NULL OR last_called_at >= ?1)",
            )
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await
            .context("Failed to summarize query stats")?;

        let slow_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM query_logs
             WHERE duration_ms >= ?1 AND (?2 IS NULL OR created_at >= ?2)",
        )
        .bind(sql_int(slow_threshold_ms))
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count slow queries")?;

        Ok(QuerySummary {
            total_queries: total_queries.max(0) as u64,
            unique_queries: unique_queries.max(0) as u64,
            avg_duration_ms: avg_duration,
            max_duration_ms: max_duration.max(0) as u64,
            slow_queries_count: slow_count.max(0) as u64,
            slow_query_threshold_ms: slow_threshold_ms,
        })
    }

    /// Delete every aggregate and log row
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM query_stats").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM query_logs").execute(&mut *tx).await?;

        tx.commit().await.context("Failed to clear query stats")?;
        Ok(())
    }

    /// Delete log rows created before the cutoff. Aggregates are kept.
    pub async fn delete_logs_before(&self, cutoff_ms: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM query_logs WHERE created_at < ?1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await
            .context("Failed to delete old query logs")?;

        Ok(result.rows_affected())
    }

    pub async fn counts(&self) -> Result<StoreStats> {
        let log_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM query_logs")
            .fetch_one(&self.pool)
            .await?;
        let aggregate_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM query_stats")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            log_count: unsigned(log_count),
            aggregate_count: unsigned(aggregate_count),
        })
    }

    /// Cheap connectivity check for readiness probes
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Bind value for an unsigned count or duration; saturates at i64::MAX
fn sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn unsigned(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn aggregate_from_row(row: &SqliteRow) -> Result<QueryStatsAggregate> {
    Ok(QueryStatsAggregate {
        id: row.try_get("id")?,
        query_hash: row.try_get("query_hash")?,
        query_normalized: row.try_get("query_normalized")?,
        call_count: unsigned(row.try_get("call_count")?),
        total_duration_ms: unsigned(row.try_get("total_duration_ms")?),
        avg_duration_ms: row.try_get("avg_duration_ms")?,
        max_duration_ms: unsigned(row.try_get("max_duration_ms")?),
        min_duration_ms: unsigned(row.try_get("min_duration_ms")?),
        last_called_at: millis_to_datetime(row.try_get("last_called_at")?),
    })
}

fn log_from_row(row: &SqliteRow) -> Result<QueryLogEntry> {
    Ok(QueryLogEntry {
        id: row.try_get("id")?,
        query_hash: row.try_get("query_hash")?,
        query_normalized: row.try_get("query_normalized")?,
        duration_ms: unsigned(row.try_get("duration_ms")?),
        rows_affected: row.try_get::<Option<i64>, _>("rows_affected")?.map(unsigned),
        source: row.try_get("source")?,
        created_at: millis_to_datetime(row.try_get("created_at")?),
    })
}
