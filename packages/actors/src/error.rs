//! Errors surfaced by the pool manager.

use db::DbError;

/// Error type for pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Invalid configuration; raised at construction.
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Failed to spawn actor: {0}")]
    Spawn(String),

    #[error("Actor messaging failed: {0}")]
    Messaging(String),
}

impl From<ractor::SpawnErr> for PoolError {
    fn from(err: ractor::SpawnErr) -> Self {
        PoolError::Spawn(err.to_string())
    }
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
