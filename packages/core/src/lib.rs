//! Core domain types for the adaptive job pool.
//!
//! This crate contains shared types used across all packages:
//! - JobPayload and JobError for work items
//! - WorkerId and ProcessorState for task processors
//! - Events emitted by processors and the pool

mod events;
mod job;
mod worker;

pub use events::{EventKind, PoolEvent, ScalingAction};
pub use job::{ALL_QUEUES, JobError, JobId, JobPayload};
pub use worker::{ProcessorState, WorkerId};
