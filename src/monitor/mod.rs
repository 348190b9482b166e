//! Query statistics monitor
//!
//! Collects per-query timing observations from database call sites and
//! keeps two views of them in SQLite:
//! - **Logs**: one immutable row per observed execution
//! - **Stats**: one running aggregate per normalized query shape
//!
//! ## Architecture
//!
//! ```text
//! record() ── normalize + hash ──► in-memory buffer
//!                                      │ (5s debounce, or 50 pending)
//!                                      ▼
//!                       flush ──► query_logs insert + query_stats upsert
//!                                      │
//!                                      ▼
//!                     HTTP API / CLI reads (top, slow, summary)
//! ```

pub mod cleanup;
pub mod collector;
pub mod normalize;
pub mod query;
pub mod store;

pub use cleanup::{run_cleanup_now, spawn_cleanup_task, RetentionPolicy};
pub use collector::{
    CollectorConfigView, CollectorSettings, CollectorSettingsUpdate, FlushPolicy, QueryCollector,
};
pub use normalize::{hash_query, normalize_query, references_own_tables};
pub use query::{
    Period, QueryLogEntry, QueryStatsAggregate, QuerySummary, SlowQueryFilter, StatsOrder, StatsQuery,
};
pub use store::{PendingQuery, QueryStatsDb, StoreStats};
