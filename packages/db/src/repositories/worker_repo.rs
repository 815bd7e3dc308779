//! Registry of task processors working against the store.

use chrono::{DateTime, Utc};
use pool_core::WorkerId;
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::{Database, DbError};

/// A task processor as recorded in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedWorker {
    pub worker_id: WorkerId,
    pub queues: Vec<String>,
    pub started_at: DateTime<Utc>,
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct WorkerRecord {
    #[allow(dead_code)]
    id: Option<Thing>,
    #[serde(flatten)]
    worker: TrackedWorker,
}

/// Repository for worker registrations.
pub struct WorkerRepository;

impl WorkerRepository {
    /// Register a worker, replacing any stale record with the same id.
    pub async fn track(
        db: &Database,
        worker_id: &WorkerId,
        queues: &[String],
    ) -> Result<TrackedWorker, DbError> {
        let worker = TrackedWorker {
            worker_id: worker_id.clone(),
            queues: queues.to_vec(),
            started_at: Utc::now(),
        };

        let mut result = db
            .query("UPSERT type::thing('worker', $id) CONTENT $worker RETURN AFTER")
            .bind(("id", worker_id.to_string()))
            .bind(("worker", worker.clone()))
            .await?;

        let records: Vec<WorkerRecord> = result.take(0)?;

        records
            .into_iter()
            .next()
            .map(|r| r.worker)
            .ok_or_else(|| DbError::Query(format!("Failed to track worker {}", worker_id)))
    }

    /// Remove a worker's registration. Removing an unknown worker is not an error.
    pub async fn untrack(db: &Database, worker_id: &WorkerId) -> Result<bool, DbError> {
        let removed: Option<WorkerRecord> = db.delete(("worker", worker_id.to_string())).await?;

        Ok(removed.is_some())
    }

    /// List all registered workers, ordered by id.
    pub async fn list(db: &Database) -> Result<Vec<TrackedWorker>, DbError> {
        let records: Vec<WorkerRecord> = db.select("worker").await?;

        let mut workers: Vec<TrackedWorker> = records.into_iter().map(|r| r.worker).collect();
        workers.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));

        Ok(workers)
    }
}
