//! Background retention task for raw query logs
//!
//! Deletes `query_logs` rows older than the retention window once a day.
//! Aggregates in `query_stats` are left alone.

use super::store::QueryStatsDb;
use anyhow::Result;
use chrono::{Datelike, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Retention configuration
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Keep raw logs for this many days
    pub logs_days: u32,

    /// Hour of day to run cleanup (0-23)
    pub cleanup_hour: u32,

    /// How often to check whether it is cleanup time
    pub check_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            logs_days: 1,
            cleanup_hour: 3,
            check_interval: Duration::from_secs(3600),
        }
    }
}

impl RetentionPolicy {
    /// Oldest `created_at` (Unix ms) that survives cleanup
    pub fn cutoff_millis(&self, now_ms: i64) -> i64 {
        now_ms - i64::from(self.logs_days) * 24 * 60 * 60 * 1000
    }
}

/// Spawn the daily retention task
pub fn spawn_cleanup_task(db: Arc<QueryStatsDb>, policy: RetentionPolicy) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        cleanup_loop(db, policy).await;
    })
}

async fn cleanup_loop(db: Arc<QueryStatsDb>, policy: RetentionPolicy) {
    let mut interval = time::interval(policy.check_interval);
    let mut last_cleanup_day: Option<u32> = None;

    loop {
        interval.tick().await;

        let now = chrono::Local::now();
        let current_day = now.ordinal();

        if now.hour() == policy.cleanup_hour && Some(current_day) != last_cleanup_day {
            tracing::info!(
                cleanup_hour = policy.cleanup_hour,
                logs_days = policy.logs_days,
                "Starting scheduled query log cleanup"
            );

            match run_cleanup_now(&db, &policy).await {
                Ok(_) => last_cleanup_day = Some(current_day),
                Err(e) => tracing::error!(error = %e, "Query log cleanup failed"),
            }
        }
    }
}

/// Run retention immediately, returning the number of deleted log rows
pub async fn run_cleanup_now(db: &QueryStatsDb, policy: &RetentionPolicy) -> Result<u64> {
    let cutoff = policy.cutoff_millis(chrono::Utc::now().timestamp_millis());
    let deleted = db.delete_logs_before(cutoff).await?;

    tracing::info!(
        logs_deleted = deleted,
        cutoff_ms = cutoff,
        "Query log cleanup completed"
    );

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::store::PendingQuery;

    fn pending() -> PendingQuery {
        PendingQuery {
            query_hash: "abc".to_string(),
            query_normalized: "SELECT ?".to_string(),
            duration_ms: 5,
            rows_affected: None,
            source: None,
        }
    }

    #[tokio::test]
    async fn test_run_cleanup_now() {
        let db = QueryStatsDb::in_memory().await.unwrap();
        let now = chrono::Utc::now().timestamp_millis();
        let three_days_ago = now - 3 * 24 * 60 * 60 * 1000;

        db.persist_batch_at(&[pending()], three_days_ago).await.unwrap();
        db.persist_batch_at(&[pending()], now).await.unwrap();

        let deleted = tokio_test::assert_ok!(run_cleanup_now(&db, &RetentionPolicy::default()).await);
        assert_eq!(deleted, 1);

        let stats = db.counts().await.unwrap();
        assert_eq!(stats.log_count, 1);
        assert_eq!(stats.aggregate_count, 1);
    }

    #[test]
    fn test_retention_policy_default() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.logs_days, 1);
        assert_eq!(policy.cleanup_hour, 3);
        assert_eq!(policy.check_interval, Duration::from_secs(3600));
        assert_eq!(policy.cutoff_millis(86_400_000), 0);
    }
}
