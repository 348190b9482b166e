//! Query monitoring HTTP API handlers
//!
//! JSON endpoints consumed by the monitoring dashboard:
//! - top queries, slow queries and summary reads
//! - runtime collector configuration
//! - clear / flush administration
//! - out-of-process observation ingestion

use crate::error::AppError;
use crate::monitor::{
    CollectorConfigView, CollectorSettingsUpdate, Period, QueryCollector, QueryLogEntry,
    QueryStatsAggregate, QuerySummary, SlowQueryFilter, StatsOrder, StatsQuery,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: u32 = 50;
const DEFAULT_SLOW_THRESHOLD_MS: u64 = 100;

/// Shared state for the query monitoring API
#[derive(Clone)]
pub struct QueryApiState {
    pub collector: QueryCollector,
}

/// Build the monitoring routes (mounted under the configured prefix)
pub fn routes(collector: QueryCollector) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/slow-queries", get(get_slow_queries))
        .route("/summary", get(get_summary))
        .route("/config", get(get_config).post(update_config))
        .route("/clear", post(clear_stats))
        .route("/flush", post(flush_logs))
        .route("/record", post(record_query))
        .with_state(QueryApiState { collector })
}

/// Query parameters for `GET /stats`
///
/// Values are kept as raw strings and parsed leniently: anything
/// unparseable falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    pub order_by: Option<String>,
    pub limit: Option<String>,
    pub period: Option<String>,
}

/// Query parameters for `GET /slow-queries`
#[derive(Debug, Default, Deserialize)]
pub struct SlowQueryParams {
    pub threshold: Option<String>,
    pub limit: Option<String>,
    pub period: Option<String>,
}

/// Query parameters for `GET /summary`
#[derive(Debug, Default, Deserialize)]
pub struct PeriodParams {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: Vec<QueryStatsAggregate>,
}

#[derive(Debug, Serialize)]
pub struct SlowQueriesResponse {
    pub queries: Vec<QueryLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

/// Body for `POST /record`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub query: String,
    pub duration_ms: u64,
    pub rows_affected: Option<u64>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub accepted: bool,
}

/// Non-zero integer, or the default when missing, zero or unparseable
fn parse_positive<T>(value: Option<&str>, default: T) -> T
where
    T: std::str::FromStr + PartialEq + Default,
{
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|n| *n != T::default())
        .unwrap_or(default)
}

/// GET /stats - Top query shapes
///
/// Example: GET /stats?orderBy=avgDuration&limit=20&period=24h
pub async fn get_stats(
    State(state): State<QueryApiState>,
    Query(params): Query<StatsParams>,
) -> Result<Json<StatsResponse>, AppError> {
    let query = StatsQuery {
        order_by: StatsOrder::parse_lenient(params.order_by.as_deref()),
        limit: parse_positive(params.limit.as_deref(), DEFAULT_LIMIT),
        period: Period::parse_lenient(params.period.as_deref()),
    };

    let stats = state.collector.top_queries(query).await?;
    Ok(Json(StatsResponse { stats }))
}

/// GET /slow-queries - Recent executions at or above a threshold
///
/// Example: GET /slow-queries?threshold=500&limit=10&period=1h
pub async fn get_slow_queries(
    State(state): State<QueryApiState>,
    Query(params): Query<SlowQueryParams>,
) -> Result<Json<SlowQueriesResponse>, AppError> {
    let filter = SlowQueryFilter {
        threshold_ms: parse_positive(params.threshold.as_deref(), DEFAULT_SLOW_THRESHOLD_MS),
        limit: parse_positive(params.limit.as_deref(), DEFAULT_LIMIT),
        period: Period::parse_lenient(params.period.as_deref()),
    };

    let queries = state.collector.slow_queries(filter).await?;
    Ok(Json(SlowQueriesResponse { queries }))
}

/// GET /summary
pub async fn get_summary(
    State(state): State<QueryApiState>,
    Query(params): Query<PeriodParams>,
) -> Result<Json<QuerySummary>, AppError> {
    let period = Period::parse_lenient(params.period.as_deref());
    let summary = state.collector.summary(period).await?;
    Ok(Json(summary))
}

/// GET /config - Runtime collector settings plus buffer depth
pub async fn get_config(State(state): State<QueryApiState>) -> Json<CollectorConfigView> {
    Json(state.collector.config_snapshot())
}

/// POST /config - Partial settings update
///
/// Fields with the wrong JSON type are ignored; only unparseable JSON is
/// rejected.
///
/// Example body: `{ "slowQueryThresholdMs": 200 }`
pub async fn update_config(
    State(state): State<QueryApiState>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<CollectorConfigView>, AppError> {
    let Json(body) = payload?;
    let update = CollectorSettingsUpdate::from_json(&body);
    Ok(Json(state.collector.update_settings(update)))
}

/// POST /clear - Delete all stats and logs
pub async fn clear_stats(State(state): State<QueryApiState>) -> Result<Json<ActionResponse>, AppError> {
    state.collector.clear().await?;
    Ok(Json(ActionResponse {
        success: true,
        message: "Query stats cleared".to_string(),
    }))
}

/// POST /flush - Persist buffered observations now
pub async fn flush_logs(State(state): State<QueryApiState>) -> Json<ActionResponse> {
    let flushed = state.collector.flush().await;
    tracing::debug!(flushed = flushed, "Forced flush via API");

    Json(ActionResponse {
        success: true,
        message: "Logs flushed".to_string(),
    })
}

/// POST /record - Accept an observation from an external call site
pub async fn record_query(
    State(state): State<QueryApiState>,
    payload: Result<Json<RecordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;
    let accepted = state.collector.record(
        &req.query,
        req.duration_ms,
        req.rows_affected,
        req.source.as_deref(),
    );

    Ok((StatusCode::ACCEPTED, Json(RecordResponse { accepted })))
}
