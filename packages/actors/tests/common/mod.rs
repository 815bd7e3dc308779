#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actors::{JobDefinition, JobRegistry, MonitorError, PoolManager, ResourceMonitor};
use db::{DbConfig, DbError, JobStore, StoreFuture, SurrealStore, TrackedWorker};
use futures_util::future::BoxFuture;
use pool_core::{EventKind, JobPayload, PoolEvent, WorkerId};
use serde_json::{Value, json};

/// Fresh in-memory store.
pub async fn setup_store() -> Arc<SurrealStore> {
    Arc::new(
        SurrealStore::connect(&DbConfig::memory())
            .await
            .expect("in-memory store"),
    )
}

/// Jobs used across the pool tests.
pub fn registry() -> JobRegistry {
    JobRegistry::new()
        .with_job("echo", JobDefinition::new(|args: Vec<Value>| async move { Ok(json!(args)) }))
        .with_job(
            "sleep",
            JobDefinition::new(|args: Vec<Value>| async move {
                let ms = args.first().and_then(Value::as_u64).unwrap_or(10);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(ms))
            }),
        )
        .with_job(
            "spin",
            JobDefinition::new(|args: Vec<Value>| async move {
                let ms = args.first().and_then(Value::as_u64).unwrap_or(10);
                Ok(json!(spin(Duration::from_millis(ms))))
            }),
        )
        .with_job("fail", JobDefinition::new(|_| async { Err("bad input".to_string()) }))
}

/// Burn CPU on the calling thread without yielding.
pub fn spin(duration: Duration) -> u64 {
    let started = Instant::now();
    let mut acc: u64 = 0;
    while started.elapsed() < duration {
        acc = std::hint::black_box(acc.wrapping_mul(31).wrapping_add(7));
    }
    acc
}

/// Monitor whose reading the test controls.
pub struct ScriptedMonitor {
    reading: Mutex<Result<f64, String>>,
}

impl ScriptedMonitor {
    pub fn new(utilization: f64) -> Arc<Self> {
        Arc::new(Self {
            reading: Mutex::new(Ok(utilization)),
        })
    }

    pub fn set(&self, utilization: f64) {
        *self.reading.lock().unwrap() = Ok(utilization);
    }

    pub fn fail(&self, message: &str) {
        *self.reading.lock().unwrap() = Err(message.to_string());
    }
}

impl ResourceMonitor for ScriptedMonitor {
    fn sample(&self) -> BoxFuture<'_, Result<f64, MonitorError>> {
        let reading = self.reading.lock().unwrap().clone();
        Box::pin(async move { reading.map_err(MonitorError::Unavailable) })
    }
}

/// Store whose polling operations can be made to fail on demand.
pub struct FlakyStore {
    inner: Arc<SurrealStore>,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<SurrealStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DbError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DbError::Query("connection reset".into()));
        }
        Ok(())
    }
}

impl JobStore for FlakyStore {
    fn enqueue<'a>(
        &'a self,
        queue: &'a str,
        class: &'a str,
        args: Vec<Value>,
    ) -> StoreFuture<'a, JobPayload> {
        self.inner.enqueue(queue, class, args)
    }

    fn claim<'a>(&'a self, queue: &'a str) -> StoreFuture<'a, Option<JobPayload>> {
        Box::pin(async move {
            self.check()?;
            self.inner.claim(queue).await
        })
    }

    fn backlog<'a>(&'a self, queues: &'a [String]) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            self.check()?;
            self.inner.backlog(queues).await
        })
    }

    fn queues(&self) -> StoreFuture<'_, Vec<String>> {
        Box::pin(async move {
            self.check()?;
            self.inner.queues().await
        })
    }

    fn del_queue<'a>(&'a self, queue: &'a str) -> StoreFuture<'a, u64> {
        self.inner.del_queue(queue)
    }

    fn track_worker<'a>(
        &'a self,
        worker_id: &'a WorkerId,
        queues: &'a [String],
    ) -> StoreFuture<'a, ()> {
        self.inner.track_worker(worker_id, queues)
    }

    fn untrack_worker<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, ()> {
        self.inner.untrack_worker(worker_id)
    }

    fn workers(&self) -> StoreFuture<'_, Vec<TrackedWorker>> {
        self.inner.workers()
    }

    fn end(&self) -> StoreFuture<'_, ()> {
        self.inner.end()
    }
}

/// Events of the given kinds, in emit order.
pub type EventLog = Arc<Mutex<Vec<PoolEvent>>>;

pub fn record(pool: &PoolManager, kinds: &[EventKind]) -> EventLog {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    for kind in kinds {
        let log = Arc::clone(&log);
        pool.on(*kind, move |event| log.lock().unwrap().push(event.clone()));
    }
    log
}

pub fn count(log: &EventLog, kind: EventKind) -> usize {
    log.lock().unwrap().iter().filter(|e| e.kind() == kind).count()
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_for<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
