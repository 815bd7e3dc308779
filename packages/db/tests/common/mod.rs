use db::{DbConfig, DbError, SurrealStore};

/// Fresh in-memory store; every `mem://` connection gets its own datastore.
pub async fn setup_store() -> Result<SurrealStore, DbError> {
    SurrealStore::connect(&DbConfig::memory()).await
}
