//! Sleeping jobs barely use CPU, so the pool should grow to its maximum.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{PoolConfig, PoolManager, ProcessMonitor, ScalingPolicy};
use common::{registry, setup_store, wait_for};
use db::JobStore;
use pool_core::{EventKind, PoolEvent};
use serde_json::json;

#[tokio::test]
async fn io_bound_jobs_grow_pool_to_max() {
    let store = setup_store().await;
    for _ in 0..50 {
        store.enqueue("io", "sleep", vec![json!(200)]).await.unwrap();
    }

    let config = PoolConfig::new(["io"])
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

    let readings = Arc::new(Mutex::new(Vec::new()));
    {
        let readings = Arc::clone(&readings);
        pool.on(EventKind::MultiWorkerAction, move |event| {
            if let PoolEvent::MultiWorkerAction { utilization, .. } = event {
                readings.lock().unwrap().push(*utilization);
            }
        });
    }

    pool.start().await.unwrap();
    assert!(wait_for(Duration::from_secs(5), || pool.workers().len() == 5).await);

    let grow_below = ScalingPolicy::default().grow_below;
    let seen = readings.lock().unwrap().clone();
    assert!(seen.len() >= 4, "expected a check per grow, saw {:?}", seen);
    assert!(
        seen.iter().all(|u| *u < grow_below),
        "utilization while growing: {:?}",
        seen
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(pool.workers().len(), 5);

    pool.end().await.unwrap();
    assert!(pool.workers().is_empty());
}
