//! SurrealDB-backed job store for the adaptive job pool.
//!
//! This crate provides database connectivity, repositories for pending jobs
//! and worker registrations, and the [`JobStore`] contract the pool runs against.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
mod store;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use repositories::TrackedWorker;
pub use schema::init_schema;
pub use store::{JobStore, StoreFuture, SurrealStore};
