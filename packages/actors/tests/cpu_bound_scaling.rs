//! Jobs that hold the CPU keep the pool at its minimum.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actors::{PoolConfig, PoolManager, ProcessMonitor};
use common::{registry, setup_store, wait_for};
use db::JobStore;
use pool_core::{EventKind, PoolEvent};
use serde_json::json;

#[tokio::test]
async fn cpu_bound_jobs_keep_pool_at_min() {
    let store = setup_store().await;
    for _ in 0..120 {
        store.enqueue("cpu", "spin", vec![json!(50)]).await.unwrap();
    }

    let config = PoolConfig::new(["cpu"])
        .with_max_task_processors(5)
        .with_check_timeout(Duration::from_millis(100))
        .with_timeout(Duration::from_millis(100));
    let pool = PoolManager::new(
        config,
        registry(),
        store.clone(),
        Arc::new(ProcessMonitor::new().unwrap()),
    )
    .unwrap();

    let peak = Arc::new(AtomicUsize::new(0));
    let checks = Arc::new(AtomicUsize::new(0));
    {
        let peak = Arc::clone(&peak);
        let checks = Arc::clone(&checks);
        pool.on(EventKind::MultiWorkerAction, move |event| {
            if let PoolEvent::MultiWorkerAction { workers, .. } = event {
                peak.fetch_max(*workers, Ordering::SeqCst);
                checks.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    pool.start().await.unwrap();
    assert!(wait_for(Duration::from_secs(4), || checks.load(Ordering::SeqCst) >= 8).await);

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(pool.workers().len(), 1);
    assert!(store.backlog(&["cpu".to_string()]).await.unwrap() > 0);

    pool.end().await.unwrap();
}
