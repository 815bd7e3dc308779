//! Pending job repository: enqueue, claim, count, and queue deletion.

use chrono::{DateTime, Utc};
use pool_core::{ALL_QUEUES, JobId, JobPayload};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use crate::{Database, DbError};

/// Repository for pending job instances.
pub struct JobRepository;

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct PendingJobRecord {
    #[allow(dead_code)]
    id: Option<Thing>,
    job_id: String,
    class: String,
    queue: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    enqueued_at: DateTime<Utc>,
}

impl PendingJobRecord {
    fn into_payload(self) -> Result<JobPayload, DbError> {
        let id = JobId::parse(&self.job_id)
            .map_err(|e| DbError::Serialization(format!("bad job id {}: {}", self.job_id, e)))?;
        Ok(JobPayload {
            id,
            class: self.class,
            queue: self.queue,
            args: self.args,
            enqueued_at: self.enqueued_at,
        })
    }
}

/// Struct for creating records - the record id is set from the job id.
#[derive(Debug, Clone, Serialize)]
struct PendingJobCreate {
    job_id: String,
    class: String,
    queue: String,
    args: Vec<serde_json::Value>,
    enqueued_at: DateTime<Utc>,
}

impl From<&JobPayload> for PendingJobCreate {
    fn from(job: &JobPayload) -> Self {
        Self {
            job_id: job.id.to_string(),
            class: job.class.clone(),
            queue: job.queue.clone(),
            args: job.args.clone(),
            enqueued_at: job.enqueued_at,
        }
    }
}

#[derive(Deserialize)]
struct CountResult {
    count: i64,
}

#[derive(Deserialize)]
struct QueueName {
    queue: String,
}

impl JobRepository {
    /// Append a job instance to its queue.
    pub async fn create(db: &Database, job: &JobPayload) -> Result<JobPayload, DbError> {
        let record: Option<PendingJobRecord> = db
            .create(("pending_job", job.id.to_string()))
            .content(PendingJobCreate::from(job))
            .await?;

        record
            .ok_or_else(|| DbError::Query("Failed to enqueue job".into()))?
            .into_payload()
    }

    /// Atomically take the oldest pending job of a queue.
    ///
    /// The job belongs to whichever caller's delete returns the record; a caller that
    /// loses the race moves on to the next candidate.
    pub async fn claim_next(db: &Database, queue: &str) -> Result<Option<JobPayload>, DbError> {
        loop {
            let mut result = db
                .query(
                    r#"
                    SELECT * FROM pending_job
                    WHERE queue = $queue
                    ORDER BY job_id ASC
                    LIMIT 1
                    "#,
                )
                .bind(("queue", queue.to_string()))
                .await?;

            let records: Vec<PendingJobRecord> = result.take(0)?;
            let Some(candidate) = records.into_iter().next() else {
                return Ok(None);
            };

            let deleted: Option<PendingJobRecord> = db
                .delete(("pending_job", candidate.job_id.clone()))
                .await?;

            match deleted {
                Some(record) => return record.into_payload().map(Some),
                None => {
                    tracing::debug!("Job {} claimed elsewhere, retrying", candidate.job_id);
                }
            }
        }
    }

    /// Count pending jobs across the given queues; `"*"` counts every queue.
    pub async fn count_pending(db: &Database, queues: &[String]) -> Result<u64, DbError> {
        let mut result = if queues.iter().any(|q| q == ALL_QUEUES) {
            db.query("SELECT count() FROM pending_job GROUP ALL").await?
        } else {
            db.query("SELECT count() FROM pending_job WHERE queue INSIDE $queues GROUP ALL")
                .bind(("queues", queues.to_vec()))
                .await?
        };

        let counts: Vec<CountResult> = result.take(0)?;

        Ok(counts
            .first()
            .map(|c| c.count.max(0) as u64)
            .unwrap_or(0))
    }

    /// List queue names that have pending jobs, sorted.
    pub async fn queue_names(db: &Database) -> Result<Vec<String>, DbError> {
        let mut result = db
            .query("SELECT queue FROM pending_job GROUP BY queue")
            .await?;

        let rows: Vec<QueueName> = result.take(0)?;
        let mut names: Vec<String> = rows.into_iter().map(|r| r.queue).collect();
        names.sort();
        names.dedup();

        Ok(names)
    }

    /// Delete a queue and every pending job in it. Returns how many jobs were removed.
    pub async fn delete_queue(db: &Database, queue: &str) -> Result<u64, DbError> {
        let mut result = db
            .query("DELETE pending_job WHERE queue = $queue RETURN BEFORE")
            .bind(("queue", queue.to_string()))
            .await?;

        let removed: Vec<PendingJobRecord> = result.take(0)?;

        Ok(removed.len() as u64)
    }
}
