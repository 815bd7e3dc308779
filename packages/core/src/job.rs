//! Job domain types: identifiers, the job instance as stored, and job-level errors.

use std::sync::{LazyLock, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

/// Queue name that matches every queue in the store.
pub const ALL_QUEUES: &str = "*";

/// Process-wide generator so ids created in the same millisecond still sort in creation order.
static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Unique identifier for a job instance, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID, monotonic within this process.
    pub fn new() -> Self {
        let mut generator = GENERATOR.lock().unwrap_or_else(|e| e.into_inner());
        // The generator only fails when the random part overflows inside one millisecond.
        Self(generator.generate().unwrap_or_else(|_| Ulid::new()))
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A job instance as it travels through the store.
///
/// Created by enqueue, removed from the store when a task processor claims it,
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Unique identifier for this instance.
    pub id: JobId,
    /// Name of the job definition to run.
    pub class: String,
    /// Queue the instance was enqueued on.
    pub queue: String,
    /// Ordered arguments passed to the job's perform function.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// When the instance was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl JobPayload {
    /// Create a new job instance for the given queue and job class.
    pub fn new(
        queue: impl Into<String>,
        class: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            id: JobId::new(),
            class: class.into(),
            queue: queue.into(),
            args,
            enqueued_at: Utc::now(),
        }
    }
}

/// Reasons a single job run fails.
///
/// These never stop a task processor; they are reported as `failure` events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The instance names a class with no registered definition.
    #[error("No job defined for class \"{0}\"")]
    NotFound(String),

    /// The job's perform function returned an error.
    #[error("{0}")]
    Execution(String),

    /// The job's perform function panicked.
    #[error("Job panicked: {0}")]
    Panicked(String),

    /// A plugin hook around the job failed.
    #[error("Plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },
}
