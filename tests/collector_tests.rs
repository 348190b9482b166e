/// Integration tests for the collector against an on-disk database
use query_monitor::monitor::{
    hash_query, CollectorSettings, FlushPolicy, Period, QueryCollector, QueryStatsDb, StatsOrder,
    StatsQuery,
};
use std::sync::Arc;
use std::time::Duration;

async fn open_db(dir: &tempfile::TempDir) -> anyhow::Result<Arc<QueryStatsDb>> {
    let url = format!("sqlite:{}", dir.path().join("monitor.db").display());
    Ok(Arc::new(QueryStatsDb::new(&url, 5).await?))
}

#[tokio::test]
async fn test_stats_survive_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;

    {
        let db = open_db(&dir).await?;
        let collector = QueryCollector::new(db.clone(), CollectorSettings::default(), FlushPolicy::default())?;
        collector.record("SELECT * FROM items WHERE sku = 'A-1'", 40, Some(1), None);
        collector.record("SELECT * FROM items WHERE sku = 'B-2'", 60, Some(1), None);
        assert_eq!(collector.flush().await, 2);
        db.pool().close().await;
    }

    let db = open_db(&dir).await?;
    let aggregate = db
        .aggregate_for_hash(&hash_query("SELECT * FROM items WHERE sku = ?"))
        .await?
        .expect("aggregate persisted");
    assert_eq!(aggregate.call_count, 2);
    assert_eq!(aggregate.total_duration_ms, 100);
    assert_eq!(aggregate.avg_duration_ms, 50.0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_are_all_persisted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_db(&dir).await?;
    let collector = QueryCollector::new(
        db.clone(),
        CollectorSettings::default(),
        FlushPolicy {
            flush_delay: Duration::from_millis(20),
            batch_size: 50,
        },
    )?;

    let mut handles = Vec::new();
    for task in 0..8 {
        let collector = collector.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..40 {
                collector.record(
                    &format!("SELECT * FROM events WHERE task = {} AND seq = {}", task, i),
                    i as u64,
                    None,
                    Some("load"),
                );
            }
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let mut persisted = 0;
    for _ in 0..300 {
        persisted = db.counts().await?.log_count;
        if persisted == 320 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(persisted, 320);

    let stats = collector
        .top_queries(StatsQuery {
            order_by: StatsOrder::CallCount,
            limit: 10,
            period: Period::LastHour,
        })
        .await?;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].call_count, 320);
    assert_eq!(stats[0].min_duration_ms, 0);
    assert_eq!(stats[0].max_duration_ms, 39);

    Ok(())
}

#[tokio::test]
async fn test_clear_keeps_buffered_observations() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_db(&dir).await?;
    let collector = QueryCollector::new(db.clone(), CollectorSettings::default(), FlushPolicy::default())?;

    collector.record("SELECT 1", 1, None, None);
    collector.flush().await;
    collector.record("SELECT 2", 2, None, None);

    collector.clear().await?;
    assert_eq!(db.counts().await?.log_count, 0);
    assert_eq!(collector.pending_count(), 1);

    assert_eq!(collector.flush().await, 1);
    assert_eq!(db.counts().await?.aggregate_count, 1);

    Ok(())
}

#[tokio::test]
async fn test_extreme_durations_keep_batch_and_reads_intact() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = open_db(&dir).await?;
    let collector = QueryCollector::new(db.clone(), CollectorSettings::default(), FlushPolicy::default())?;

    collector.record("SELECT * FROM carts WHERE id = 1", 8, None, None);
    collector.record("SELECT * FROM exports WHERE id = 1", u64::MAX, None, None);
    collector.record("SELECT * FROM carts WHERE id = 2", 12, None, None);
    assert_eq!(collector.flush().await, 3);

    collector.record("SELECT * FROM exports WHERE id = 2", i64::MAX as u64, None, None);
    assert_eq!(collector.flush().await, 1);

    let counts = db.counts().await?;
    assert_eq!(counts.log_count, 4);
    assert_eq!(counts.aggregate_count, 2);

    let carts = db
        .aggregate_for_hash(&hash_query("SELECT * FROM carts WHERE id = ?"))
        .await?
        .expect("carts aggregate persisted");
    assert_eq!(carts.total_duration_ms, 20);

    let stats = collector
        .top_queries(StatsQuery {
            order_by: StatsOrder::TotalDuration,
            limit: 10,
            period: Period::All,
        })
        .await?;
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].total_duration_ms, i64::MAX as u64);
    assert_eq!(stats[0].call_count, 2);

    let summary = collector.summary(Period::All).await?;
    assert_eq!(summary.total_queries, 4);
    assert_eq!(summary.slow_queries_count, 2);

    Ok(())
}
