//! Repository implementations for database operations.

mod job_repo;
mod worker_repo;

pub use job_repo::JobRepository;
pub use worker_repo::{TrackedWorker, WorkerRepository};
