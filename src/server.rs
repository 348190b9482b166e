use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::Path, path::PathBuf, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    handlers, metrics,
    monitor::{spawn_cleanup_task, QueryCollector, QueryStatsDb},
    signals::setup_signal_handlers,
};

/// Start the query monitor server
///
/// This function:
/// 1. Opens the stats database and runs migrations
/// 2. Creates the collector and the retention task
/// 3. Initializes metrics
/// 4. Sets up signal handlers for graceful shutdown and settings reload
/// 5. Serves requests, then flushes buffered observations on shutdown
pub async fn start_server(config: Config, config_path: PathBuf) -> Result<()> {
    let db = Arc::new(open_database(&config).await?);

    let collector = QueryCollector::new(
        db.clone(),
        config.collector.settings(),
        config.collector.flush_policy(),
    )?;

    if config.retention.enabled {
        spawn_cleanup_task(db.clone(), config.retention.policy());
        info!(
            logs_days = config.retention.logs_days,
            cleanup_hour = config.retention.cleanup_hour,
            "Query log retention enabled"
        );
    }

    let metrics_handle = if config.metrics.enabled {
        info!("Initializing Prometheus metrics...");
        Some(Arc::new(metrics::init_metrics()?))
    } else {
        None
    };

    let (shutdown_tx, signal_handle) = setup_signal_handlers(config_path, collector.clone())?;
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app = create_router(&config, collector.clone(), metrics_handle);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting query monitor on {}", addr);
    info!(
        "Configuration: API prefix {}, slow threshold {}ms, flush every {}ms or {} queries",
        config.api.prefix,
        config.collector.slow_query_threshold_ms,
        config.collector.flush_delay_ms,
        config.collector.flush_batch_size
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    let flushed = collector.flush().await;
    info!(flushed = flushed, "Flushed pending query logs");

    signal_handle.await?;
    db.pool().close().await;
    info!("Server stopped gracefully");

    Ok(())
}

/// Open the configured database, creating its parent directory if needed
pub async fn open_database(config: &Config) -> Result<QueryStatsDb> {
    if let Some(parent) = Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }

    QueryStatsDb::new(&config.database.url(), config.database.max_connections).await
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    config: &Config,
    collector: QueryCollector,
    metrics_handle: Option<Arc<PrometheusHandle>>,
) -> Router {
    let db = collector.db().clone();

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/ready",
            get(handlers::health::readiness_check).with_state(db),
        )
        .nest(&config.api.prefix, handlers::query_api::routes(collector));

    if let Some(handle) = metrics_handle {
        app = app.route(
            &config.metrics.endpoint,
            get(handlers::metrics_handler::metrics).with_state(handle),
        );
    }

    app.layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(TraceLayer::new_for_http())
}
