//! In-memory query observation buffer with debounced flushing
//!
//! Call sites hand observations to [`QueryCollector::record`], which only
//! normalizes, hashes and appends to a buffer. Persistence happens in
//! background tasks:
//! - a delayed flush armed by the first record after the previous one fired
//! - an immediate flush once the buffer reaches the batch size
//! - a forced flush through [`QueryCollector::flush`] (API, shutdown)
//!
//! Every flush swaps the buffer out under the lock before awaiting, so
//! records arriving during a flush land in a fresh buffer.

use super::normalize::{hash_query, normalize_query, references_own_tables};
use super::query::{Period, QueryLogEntry, QueryStatsAggregate, QuerySummary, SlowQueryFilter, StatsQuery};
use super::store::{PendingQuery, QueryStatsDb};
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

/// Length of the query preview in diagnostic lines
const PREVIEW_CHARS: usize = 100;

/// Largest duration SQLite can store as an INTEGER; longer ones are clamped
pub const MAX_DURATION_MS: u64 = i64::MAX as u64;

/// Runtime-mutable collection settings (reset to config values on restart)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorSettings {
    pub enabled: bool,
    pub log_to_console: bool,
    pub slow_query_threshold_ms: u64,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_to_console: false,
            slow_query_threshold_ms: 100,
        }
    }
}

/// Partial settings update; `None` fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorSettingsUpdate {
    pub enabled: Option<bool>,
    pub slow_query_threshold_ms: Option<u64>,
    pub log_to_console: Option<bool>,
}

impl CollectorSettingsUpdate {
    /// Build an update from an arbitrary JSON body.
    ///
    /// Each field is taken only when it has the expected JSON type; anything
    /// else (wrong type, non-object body) is ignored. Numeric thresholds are
    /// rounded up to whole milliseconds and negative ones become 0, which
    /// keeps `duration >= threshold` true for the same integer durations.
    pub fn from_json(body: &serde_json::Value) -> Self {
        Self {
            enabled: body.get("enabled").and_then(serde_json::Value::as_bool),
            slow_query_threshold_ms: body
                .get("slowQueryThresholdMs")
                .and_then(threshold_from_json),
            log_to_console: body.get("logToConsole").and_then(serde_json::Value::as_bool),
        }
    }

    fn apply(&self, current: &CollectorSettings) -> CollectorSettings {
        CollectorSettings {
            enabled: self.enabled.unwrap_or(current.enabled),
            log_to_console: self.log_to_console.unwrap_or(current.log_to_console),
            slow_query_threshold_ms: self
                .slow_query_threshold_ms
                .unwrap_or(current.slow_query_threshold_ms),
        }
    }
}

fn threshold_from_json(value: &serde_json::Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if value.as_i64().is_some() {
        return Some(0);
    }

    let n = value.as_f64()?;
    if !n.is_finite() {
        return None;
    }
    // `as` saturates for out-of-range floats
    Some(n.max(0.0).ceil() as u64)
}

/// Settings plus buffer depth, as exposed by `GET /config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfigView {
    pub enabled: bool,
    pub log_to_console: bool,
    pub slow_query_threshold_ms: u64,
    pub pending_logs_count: usize,
}

/// Static flush tuning
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    /// Delay between the arming record and the scheduled flush (default: 5s)
    pub flush_delay: Duration,
    /// Buffer depth that triggers an immediate flush (default: 50)
    pub batch_size: usize,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_millis(5000),
            batch_size: 50,
        }
    }
}

/// Shared handle to the query statistics collector
///
/// Cheap to clone; construct once at startup and pass to every call site.
#[derive(Clone)]
pub struct QueryCollector {
    inner: Arc<CollectorInner>,
}

struct CollectorInner {
    db: Arc<QueryStatsDb>,
    settings: ArcSwap<CollectorSettings>,
    buffer: Mutex<Vec<PendingQuery>>,
    timer_armed: AtomicBool,
    runtime: Handle,
    policy: FlushPolicy,
}

impl QueryCollector {
    /// Create a collector bound to the current Tokio runtime
    pub fn new(db: Arc<QueryStatsDb>, settings: CollectorSettings, policy: FlushPolicy) -> Result<Self> {
        let runtime = Handle::try_current()
            .context("QueryCollector must be created inside a Tokio runtime")?;

        Ok(Self {
            inner: Arc::new(CollectorInner {
                db,
                settings: ArcSwap::from_pointee(settings),
                buffer: Mutex::new(Vec::with_capacity(policy.batch_size)),
                timer_armed: AtomicBool::new(false),
                runtime,
                policy,
            }),
        })
    }

    /// Record one query execution.
    ///
    /// Never blocks on I/O and never fails: disabled collection and queries
    /// against the monitor's own tables are skipped, durations above
    /// [`MAX_DURATION_MS`] are clamped. Returns whether the observation was
    /// buffered.
    pub fn record(
        &self,
        query: &str,
        duration_ms: u64,
        rows_affected: Option<u64>,
        source: Option<&str>,
    ) -> bool {
        let settings = **self.inner.settings.load();
        let duration_ms = duration_ms.min(MAX_DURATION_MS);

        if !settings.enabled {
            crate::metrics::record_skipped("disabled");
            return false;
        }
        if references_own_tables(query) {
            crate::metrics::record_skipped("self_reference");
            return false;
        }

        let query_normalized = normalize_query(query);
        let query_hash = hash_query(&query_normalized);

        if let Some(line) = diagnostic_line(&settings, duration_ms, &query_normalized) {
            if duration_ms >= settings.slow_query_threshold_ms {
                tracing::warn!(
                    query_hash = %query_hash,
                    duration_ms = duration_ms,
                    source = source.unwrap_or("-"),
                    "{}", line
                );
            } else {
                tracing::info!(
                    query_hash = %query_hash,
                    duration_ms = duration_ms,
                    source = source.unwrap_or("-"),
                    "{}", line
                );
            }
        }

        crate::metrics::record_observation();

        let drained = {
            let mut buffer = self.lock_buffer();
            buffer.push(PendingQuery {
                query_hash,
                query_normalized,
                duration_ms,
                rows_affected,
                source: source.map(str::to_string),
            });

            if buffer.len() >= self.inner.policy.batch_size {
                Some(std::mem::take(&mut *buffer))
            } else {
                crate::metrics::set_pending(buffer.len());
                None
            }
        };

        match drained {
            Some(batch) => {
                crate::metrics::set_pending(0);
                self.spawn_persist(batch);
            }
            None => self.schedule_flush(),
        }

        true
    }

    /// Drain the buffer and persist it now.
    ///
    /// Returns the number of records written. Persistence errors are logged
    /// and the drained batch is dropped, so this never fails; calling it on
    /// an empty buffer is a no-op.
    pub async fn flush(&self) -> usize {
        let batch = self.drain();
        persist(&self.inner.db, batch).await
    }

    /// Number of observations waiting for the next flush
    pub fn pending_count(&self) -> usize {
        self.lock_buffer().len()
    }

    pub fn settings(&self) -> CollectorSettings {
        **self.inner.settings.load()
    }

    /// Apply a partial settings update and return the resulting view
    pub fn update_settings(&self, update: CollectorSettingsUpdate) -> CollectorConfigView {
        self.inner.settings.rcu(|current| update.apply(current));

        let view = self.config_snapshot();
        tracing::info!(
            enabled = view.enabled,
            log_to_console = view.log_to_console,
            slow_query_threshold_ms = view.slow_query_threshold_ms,
            "Query collector settings updated"
        );
        view
    }

    /// Replace all settings (config reload)
    pub fn replace_settings(&self, settings: CollectorSettings) {
        self.inner.settings.store(Arc::new(settings));
    }

    pub fn config_snapshot(&self) -> CollectorConfigView {
        let settings = self.settings();
        CollectorConfigView {
            enabled: settings.enabled,
            log_to_console: settings.log_to_console,
            slow_query_threshold_ms: settings.slow_query_threshold_ms,
            pending_logs_count: self.pending_count(),
        }
    }

    pub async fn top_queries(&self, query: StatsQuery) -> Result<Vec<QueryStatsAggregate>> {
        self.inner.db.top_queries(query).await
    }

    pub async fn slow_queries(&self, filter: SlowQueryFilter) -> Result<Vec<QueryLogEntry>> {
        self.inner.db.slow_queries(filter).await
    }

    /// Summary using the current slow-query threshold
    pub async fn summary(&self, period: Period) -> Result<QuerySummary> {
        let threshold = self.settings().slow_query_threshold_ms;
        self.inner.db.summary(period, threshold).await
    }

    /// Delete all persisted statistics. Buffered observations are kept.
    pub async fn clear(&self) -> Result<()> {
        self.inner.db.clear().await?;
        tracing::info!("Query stats cleared");
        Ok(())
    }

    pub fn db(&self) -> &Arc<QueryStatsDb> {
        &self.inner.db
    }

    fn lock_buffer(&self) -> MutexGuard<'_, Vec<PendingQuery>> {
        // A panic while holding the lock leaves the Vec itself intact.
        self.inner.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self) -> Vec<PendingQuery> {
        let batch = std::mem::take(&mut *self.lock_buffer());
        crate::metrics::set_pending(0);
        batch
    }

    fn schedule_flush(&self) {
        if self.inner.timer_armed.swap(true, Ordering::AcqRel) {
            return;
        }

        let collector = self.clone();
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(collector.inner.policy.flush_delay).await;
            collector.inner.timer_armed.store(false, Ordering::Release);
            collector.flush().await;
        });
    }

    fn spawn_persist(&self, batch: Vec<PendingQuery>) {
        let db = self.inner.db.clone();
        self.inner.runtime.spawn(async move {
            let result = std::panic::AssertUnwindSafe(persist(&db, batch))
                .catch_unwind()
                .await;
            if let Err(e) = result {
                tracing::error!(panic = ?e, "Query log flush task panicked");
            }
        });
    }
}

/// Write one drained batch; failures drop the batch
async fn persist(db: &QueryStatsDb, batch: Vec<PendingQuery>) -> usize {
    if batch.is_empty() {
        return 0;
    }

    let count = batch.len();
    let start = Instant::now();

    match db.persist_batch(&batch).await {
        Ok(()) => {
            let elapsed = start.elapsed();
            tracing::debug!(
                count = count,
                duration_ms = elapsed.as_millis() as u64,
                "Flushed query log batch"
            );
            crate::metrics::record_flush(count, elapsed);
            count
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                count = count,
                "Failed to flush query logs, dropping batch"
            );
            crate::metrics::record_flush_failure(count);
            0
        }
    }
}

/// Console line for an observation, if one should be emitted
pub fn diagnostic_line(
    settings: &CollectorSettings,
    duration_ms: u64,
    normalized: &str,
) -> Option<String> {
    let slow = duration_ms >= settings.slow_query_threshold_ms;
    if !slow && !settings.log_to_console {
        return None;
    }

    let prefix = if slow { "[SLOW QUERY]" } else { "[Query]" };
    let preview: String = normalized.chars().take(PREVIEW_CHARS).collect();
    Some(format!("{} {}ms: {}...", prefix, duration_ms, preview))
}
