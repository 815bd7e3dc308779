//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables and indexes. Safe to run on every connect.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::debug!("Initializing database schema...");

    db.query(PENDING_JOB_SCHEMA).await?.check()?;
    db.query(WORKER_SCHEMA).await?.check()?;

    tracing::debug!("Database schema initialized");

    Ok(())
}

/// Pending job instances, one record per enqueued job.
///
/// Schemaless so job arguments keep arbitrary nested JSON.
const PENDING_JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS pending_job SCHEMALESS;

DEFINE FIELD IF NOT EXISTS job_id ON pending_job TYPE string;
DEFINE FIELD IF NOT EXISTS class ON pending_job TYPE string;
DEFINE FIELD IF NOT EXISTS queue ON pending_job TYPE string;

-- Claims scan one queue in id order
DEFINE INDEX IF NOT EXISTS pending_job_queue ON pending_job FIELDS queue, job_id;
"#;

/// Task processors currently registered against this store.
const WORKER_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS worker SCHEMALESS;

DEFINE FIELD IF NOT EXISTS worker_id ON worker TYPE string;
DEFINE FIELD IF NOT EXISTS queues ON worker TYPE array<string>;
"#;
