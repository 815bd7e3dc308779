//! Adaptive pool of task processors built on ractor.
//!
//! # Architecture
//!
//! - `PoolManager` - Public handle: start, end, inspect, and listen to the pool
//! - `PoolActor` - Owns the task processors and runs the periodic scaling check
//! - `ProcessorActor` - Polls its queues and performs one job at a time
//!
//! Every processor shares one [`db::JobStore`]; the store guarantees a job is
//! claimed at most once. Scaling samples this process's CPU usage through a
//! [`ResourceMonitor`] and the store's backlog, then adds or removes at most one
//! processor per check.
//!
//! # Usage
//!
//! ```ignore
//! use actors::{JobDefinition, JobRegistry, PoolConfig, PoolManager};
//!
//! let registry = JobRegistry::new()
//!     .with_job("add", JobDefinition::new(|args| async move {
//!         let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
//!         Ok(serde_json::json!(sum))
//!     }));
//!
//! let pool = PoolManager::connect(PoolConfig::new(["math"]), registry).await?;
//! pool.start().await?;
//! pool.store().enqueue("math", "add", vec![1.into(), 2.into()]).await?;
//! ```

mod config;
mod error;
mod events;
mod handler;
mod messages;
mod monitor;
mod pool;
mod pool_actor;
mod processor_actor;
mod scaling;

pub use config::PoolConfig;
pub use error::{PoolError, PoolResult};
pub use events::{EventBus, EventSink, Listener, ListenerId};
pub use handler::{Invocation, JobDefinition, JobPlugin, JobRegistry, PerformFuture, PerformResult};
pub use messages::{PoolMessage, ProcessorMessage};
pub use monitor::{MonitorError, ProcessMonitor, ResourceMonitor};
pub use pool::PoolManager;
pub use pool_actor::{PoolActor, PoolArgs, WorkerView};
pub use processor_actor::{ProcessorActor, ProcessorArgs, StatusCell};
pub use scaling::{ScalingInput, ScalingPolicy};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
