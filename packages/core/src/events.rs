//! Event types emitted by task processors and the pool manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobPayload, WorkerId};

/// Outcome of one scaling check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    /// Add one task processor.
    Grow,
    /// Remove one idle task processor.
    Shrink,
    /// Keep the current count.
    Hold,
}

impl std::fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalingAction::Grow => write!(f, "grow"),
            ScalingAction::Shrink => write!(f, "shrink"),
            ScalingAction::Hold => write!(f, "hold"),
        }
    }
}

/// Event kinds listeners can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    End,
    CleaningUp,
    Poll,
    Job,
    Success,
    Failure,
    Error,
    Pause,
    InternalError,
    MultiWorkerAction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::End => "end",
            EventKind::CleaningUp => "cleaning_up",
            EventKind::Poll => "poll",
            EventKind::Job => "job",
            EventKind::Success => "success",
            EventKind::Failure => "failure",
            EventKind::Error => "error",
            EventKind::Pause => "pause",
            EventKind::InternalError => "internal_error",
            EventKind::MultiWorkerAction => "multi_worker_action",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the pool and its task processors.
///
/// Processor events carry the emitting processor's id; `InternalError` and
/// `MultiWorkerAction` come from the pool itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PoolEvent {
    /// A task processor started.
    Start {
        worker_id: WorkerId,
        timestamp: DateTime<Utc>,
    },
    /// A task processor exited.
    End {
        worker_id: WorkerId,
        timestamp: DateTime<Utc>,
    },
    /// A task processor is releasing its registration before exiting.
    CleaningUp {
        worker_id: WorkerId,
        timestamp: DateTime<Utc>,
    },
    /// A task processor is checking a queue for work.
    Poll {
        worker_id: WorkerId,
        queue: String,
        timestamp: DateTime<Utc>,
    },
    /// A task processor claimed a job.
    Job {
        worker_id: WorkerId,
        queue: String,
        job: JobPayload,
        timestamp: DateTime<Utc>,
    },
    /// A job finished successfully.
    Success {
        worker_id: WorkerId,
        queue: String,
        job: JobPayload,
        result: serde_json::Value,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    Failure {
        worker_id: WorkerId,
        queue: String,
        job: JobPayload,
        error: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A fault unrelated to a job's own outcome (store connectivity, failed scaling check).
    Error {
        worker_id: Option<WorkerId>,
        queue: Option<String>,
        job: Option<JobPayload>,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A task processor found no work and is waiting before the next poll.
    Pause {
        worker_id: WorkerId,
        timestamp: DateTime<Utc>,
    },
    /// The pool's own plumbing failed (processor crash, spawn failure).
    InternalError {
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Result of a scaling check.
    MultiWorkerAction {
        action: ScalingAction,
        utilization: f64,
        backlog: u64,
        workers: usize,
        timestamp: DateTime<Utc>,
    },
}

impl PoolEvent {
    /// Get the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            PoolEvent::Start { .. } => EventKind::Start,
            PoolEvent::End { .. } => EventKind::End,
            PoolEvent::CleaningUp { .. } => EventKind::CleaningUp,
            PoolEvent::Poll { .. } => EventKind::Poll,
            PoolEvent::Job { .. } => EventKind::Job,
            PoolEvent::Success { .. } => EventKind::Success,
            PoolEvent::Failure { .. } => EventKind::Failure,
            PoolEvent::Error { .. } => EventKind::Error,
            PoolEvent::Pause { .. } => EventKind::Pause,
            PoolEvent::InternalError { .. } => EventKind::InternalError,
            PoolEvent::MultiWorkerAction { .. } => EventKind::MultiWorkerAction,
        }
    }

    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PoolEvent::Start { timestamp, .. } => *timestamp,
            PoolEvent::End { timestamp, .. } => *timestamp,
            PoolEvent::CleaningUp { timestamp, .. } => *timestamp,
            PoolEvent::Poll { timestamp, .. } => *timestamp,
            PoolEvent::Job { timestamp, .. } => *timestamp,
            PoolEvent::Success { timestamp, .. } => *timestamp,
            PoolEvent::Failure { timestamp, .. } => *timestamp,
            PoolEvent::Error { timestamp, .. } => *timestamp,
            PoolEvent::Pause { timestamp, .. } => *timestamp,
            PoolEvent::InternalError { timestamp, .. } => *timestamp,
            PoolEvent::MultiWorkerAction { timestamp, .. } => *timestamp,
        }
    }

    /// Get the id of the task processor that emitted this event, if any.
    pub fn worker_id(&self) -> Option<&WorkerId> {
        match self {
            PoolEvent::Start { worker_id, .. }
            | PoolEvent::End { worker_id, .. }
            | PoolEvent::CleaningUp { worker_id, .. }
            | PoolEvent::Poll { worker_id, .. }
            | PoolEvent::Job { worker_id, .. }
            | PoolEvent::Success { worker_id, .. }
            | PoolEvent::Failure { worker_id, .. }
            | PoolEvent::Pause { worker_id, .. } => Some(worker_id),
            PoolEvent::Error { worker_id, .. } => worker_id.as_ref(),
            PoolEvent::InternalError { .. } | PoolEvent::MultiWorkerAction { .. } => None,
        }
    }

    /// Get the queue name associated with this event, if any.
    pub fn queue(&self) -> Option<&str> {
        match self {
            PoolEvent::Poll { queue, .. }
            | PoolEvent::Job { queue, .. }
            | PoolEvent::Success { queue, .. }
            | PoolEvent::Failure { queue, .. } => Some(queue),
            PoolEvent::Error { queue, .. } => queue.as_deref(),
            _ => None,
        }
    }

    /// Get the job instance associated with this event, if any.
    pub fn job(&self) -> Option<&JobPayload> {
        match self {
            PoolEvent::Job { job, .. }
            | PoolEvent::Success { job, .. }
            | PoolEvent::Failure { job, .. } => Some(job),
            PoolEvent::Error { job, .. } => job.as_ref(),
            _ => None,
        }
    }

    /// Get the measured job duration, for success and failure events.
    pub fn duration_ms(&self) -> Option<u64> {
        match self {
            PoolEvent::Success { duration_ms, .. } | PoolEvent::Failure { duration_ms, .. } => {
                Some(*duration_ms)
            }
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            PoolEvent::Start { worker_id, .. } => format!("Worker {} started", worker_id),
            PoolEvent::End { worker_id, .. } => format!("Worker {} ended", worker_id),
            PoolEvent::CleaningUp { worker_id, .. } => {
                format!("Worker {} cleaning up", worker_id)
            }
            PoolEvent::Poll {
                worker_id, queue, ..
            } => format!("Worker {} polling {}", worker_id, queue),
            PoolEvent::Job { worker_id, job, .. } => {
                format!("Worker {} working on {} ({})", worker_id, job.class, job.id)
            }
            PoolEvent::Success {
                worker_id,
                job,
                duration_ms,
                ..
            } => format!(
                "Worker {} completed {} in {}ms",
                worker_id, job.class, duration_ms
            ),
            PoolEvent::Failure {
                worker_id,
                job,
                error,
                duration_ms,
                ..
            } => format!(
                "Worker {} failed {} after {}ms: {}",
                worker_id, job.class, duration_ms, error
            ),
            PoolEvent::Error {
                worker_id, error, ..
            } => match worker_id {
                Some(id) => format!("Worker {} error: {}", id, error),
                None => format!("Pool error: {}", error),
            },
            PoolEvent::Pause { worker_id, .. } => format!("Worker {} paused", worker_id),
            PoolEvent::InternalError { error, .. } => format!("Internal error: {}", error),
            PoolEvent::MultiWorkerAction {
                action,
                utilization,
                backlog,
                workers,
                ..
            } => format!(
                "Scaling {} (workers: {}, cpu: {:.0}%, backlog: {})",
                action,
                workers,
                utilization * 100.0,
                backlog
            ),
        }
    }
}
