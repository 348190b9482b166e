/// Integration tests for the monitoring HTTP API mounted on the full router
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use query_monitor::{
    config::Config,
    monitor::{QueryCollector, QueryStatsDb},
    server::{create_router, open_database},
};
use std::sync::Arc;
use tower::ServiceExt;

async fn create_app(dir: &tempfile::TempDir) -> anyhow::Result<(Router, QueryCollector)> {
    let mut config = Config::default();
    config.database.path = dir.path().join("monitor.db").to_string_lossy().into_owned();

    let db: Arc<QueryStatsDb> = Arc::new(open_database(&config).await?);
    let collector = QueryCollector::new(
        db,
        config.collector.settings(),
        config.collector.flush_policy(),
    )?;

    Ok((create_router(&config, collector.clone(), None), collector))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_routes_are_nested_under_prefix() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (app, _collector) = create_app(&dir).await?;

    let (status, body) = send(&app, "GET", "/api/monitoring/queries/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "stats": [] }));

    let (status, _) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_health_and_readiness() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (app, _collector) = create_app(&dir).await?;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    Ok(())
}

#[tokio::test]
async fn test_dashboard_flow() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (app, _collector) = create_app(&dir).await?;
    let prefix = "/api/monitoring/queries";

    for (query, duration) in [
        ("SELECT * FROM orders WHERE id = 1", 10),
        ("SELECT  *  FROM orders WHERE id = 2", 30),
        ("SELECT * FROM orders WHERE id = 3", 20),
        ("UPDATE users SET name = 'x' WHERE id = 9", 250),
    ] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("{}/record", prefix),
            Some(serde_json::json!({ "query": query, "durationMs": duration, "source": "api-test" })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["accepted"], true);
    }

    let (_, body) = send(&app, "GET", &format!("{}/config", prefix), None).await;
    assert_eq!(body["pendingLogsCount"], 4);

    let (status, _) = send(&app, "POST", &format!("{}/flush", prefix), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", &format!("{}/config", prefix), None).await;
    assert_eq!(body["pendingLogsCount"], 0);

    let (_, body) = send(&app, "GET", &format!("{}/stats?orderBy=totalDuration", prefix), None).await;
    let stats = body["stats"].as_array().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0]["queryNormalized"], "UPDATE users SET name = ? WHERE id = ?");
    assert_eq!(stats[1]["callCount"], 3);
    assert_eq!(stats[1]["minDurationMs"], 10);
    assert_eq!(stats[1]["maxDurationMs"], 30);

    let (_, body) = send(&app, "GET", &format!("{}/slow-queries", prefix), None).await;
    let queries = body["queries"].as_array().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0]["durationMs"], 250);
    assert_eq!(queries[0]["source"], "api-test");

    let (_, body) = send(&app, "GET", &format!("{}/summary", prefix), None).await;
    assert_eq!(body["totalQueries"], 4);
    assert_eq!(body["uniqueQueries"], 2);
    assert_eq!(body["slowQueriesCount"], 1);

    // The summary counts slow logs against the current threshold
    let (_, body) = send(
        &app,
        "POST",
        &format!("{}/config", prefix),
        Some(serde_json::json!({ "slowQueryThresholdMs": 500 })),
    )
    .await;
    assert_eq!(body["slowQueryThresholdMs"], 500);

    let (_, body) = send(&app, "GET", &format!("{}/summary", prefix), None).await;
    assert_eq!(body["slowQueriesCount"], 0);
    assert_eq!(body["slowQueryThresholdMs"], 500);

    Ok(())
}

#[tokio::test]
async fn test_disabled_collector_rejects_records() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (app, collector) = create_app(&dir).await?;
    let prefix = "/api/monitoring/queries";

    send(&app, "POST", &format!("{}/config", prefix), Some(serde_json::json!({ "enabled": false }))).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/record", prefix),
        Some(serde_json::json!({ "query": "SELECT 1", "durationMs": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], false);
    assert_eq!(collector.pending_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_record_rejects_missing_fields() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let (app, _collector) = create_app(&dir).await?;

    let (status, body) = send(
        &app,
        "POST",
        "/api/monitoring/queries/record",
        Some(serde_json::json!({ "query": "SELECT 1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    Ok(())
}
