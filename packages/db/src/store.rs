//! The store contract task processors and the pool depend on, and its SurrealDB implementation.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::BoxFuture;
use pool_core::{JobPayload, WorkerId};
use tokio::sync::Mutex;

use crate::repositories::{JobRepository, TrackedWorker, WorkerRepository};
use crate::{Database, DbConfig, DbError, connect};

/// Future type returned by store operations.
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, DbError>>;

/// Shared, durable job store.
///
/// `claim` must hand each pending instance to at most one caller.
pub trait JobStore: Send + Sync + 'static {
    /// Append a job instance to `queue`; resolves once written.
    fn enqueue<'a>(
        &'a self,
        queue: &'a str,
        class: &'a str,
        args: Vec<serde_json::Value>,
    ) -> StoreFuture<'a, JobPayload>;

    /// Remove and return the next pending instance of `queue`, if any.
    fn claim<'a>(&'a self, queue: &'a str) -> StoreFuture<'a, Option<JobPayload>>;

    /// Count pending instances across `queues` (`"*"` matches all).
    fn backlog<'a>(&'a self, queues: &'a [String]) -> StoreFuture<'a, u64>;

    /// Names of queues with pending instances, sorted.
    fn queues(&self) -> StoreFuture<'_, Vec<String>>;

    /// Remove a queue and all of its pending instances.
    fn del_queue<'a>(&'a self, queue: &'a str) -> StoreFuture<'a, u64>;

    /// Record a task processor as working against this store.
    fn track_worker<'a>(
        &'a self,
        worker_id: &'a WorkerId,
        queues: &'a [String],
    ) -> StoreFuture<'a, ()>;

    /// Drop a task processor's record.
    fn untrack_worker<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, ()>;

    /// All recorded task processors.
    fn workers(&self) -> StoreFuture<'_, Vec<TrackedWorker>>;

    /// Release the connection. Later calls fail with [`DbError::Closed`].
    fn end(&self) -> StoreFuture<'_, ()>;
}

/// [`JobStore`] backed by SurrealDB.
///
/// Claims issued through one store handle are serialized; exclusivity between
/// processes comes from the record delete in [`JobRepository::claim_next`].
pub struct SurrealStore {
    db: Database,
    closed: AtomicBool,
    claim_lock: Mutex<()>,
}

impl SurrealStore {
    /// Connect using the given configuration.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let db = connect(config).await?;
        Ok(Self::from_database(db))
    }

    /// Wrap an already connected database handle.
    pub fn from_database(db: Database) -> Self {
        Self {
            db,
            closed: AtomicBool::new(false),
            claim_lock: Mutex::new(()),
        }
    }

    fn db(&self) -> Result<&Database, DbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::Closed);
        }
        Ok(&self.db)
    }
}

impl JobStore for SurrealStore {
    fn enqueue<'a>(
        &'a self,
        queue: &'a str,
        class: &'a str,
        args: Vec<serde_json::Value>,
    ) -> StoreFuture<'a, JobPayload> {
        Box::pin(async move {
            let job = JobPayload::new(queue, class, args);
            JobRepository::create(self.db()?, &job).await
        })
    }

    fn claim<'a>(&'a self, queue: &'a str) -> StoreFuture<'a, Option<JobPayload>> {
        Box::pin(async move {
            let db = self.db()?;
            let _guard = self.claim_lock.lock().await;
            JobRepository::claim_next(db, queue).await
        })
    }

    fn backlog<'a>(&'a self, queues: &'a [String]) -> StoreFuture<'a, u64> {
        Box::pin(async move { JobRepository::count_pending(self.db()?, queues).await })
    }

    fn queues(&self) -> StoreFuture<'_, Vec<String>> {
        Box::pin(async move { JobRepository::queue_names(self.db()?).await })
    }

    fn del_queue<'a>(&'a self, queue: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let removed = JobRepository::delete_queue(self.db()?, queue).await?;
            tracing::debug!("Deleted queue {} ({} pending jobs)", queue, removed);
            Ok(removed)
        })
    }

    fn track_worker<'a>(
        &'a self,
        worker_id: &'a WorkerId,
        queues: &'a [String],
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            WorkerRepository::track(self.db()?, worker_id, queues).await?;
            Ok(())
        })
    }

    fn untrack_worker<'a>(&'a self, worker_id: &'a WorkerId) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            WorkerRepository::untrack(self.db()?, worker_id).await?;
            Ok(())
        })
    }

    fn workers(&self) -> StoreFuture<'_, Vec<TrackedWorker>> {
        Box::pin(async move { WorkerRepository::list(self.db()?).await })
    }

    fn end(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if !self.closed.swap(true, Ordering::AcqRel) {
                tracing::info!("Store connection closed");
            }
            Ok(())
        })
    }
}
