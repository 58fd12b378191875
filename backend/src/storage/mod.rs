//! Persistence port for tasks and the backends that implement it.

mod memory;
mod postgres;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use shared::Task;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::health::ServiceHealth;

pub use self::memory::MemoryTaskRepository;
pub use self::postgres::PostgresTaskRepository;
pub use self::redis::RedisTaskRepository;

#[derive(Debug, Error)]
pub enum StorageError {
    /// No row matched the identifier. The only condition callers may treat
    /// as "not found".
    #[error("no matching row")]
    NoRows,

    #[error("duplicate task id: {0}")]
    Duplicate(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Task persistence contract.
///
/// Every write stores complete field values; there is no partial write.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Inserts a new task and returns it as stored.
    async fn create(&self, task: &Task) -> Result<Task, StorageError>;

    /// Returns [`StorageError::NoRows`] when the task does not exist.
    async fn find_by_id(&self, id: Uuid) -> Result<Task, StorageError>;

    /// All tasks, newest `created_at` first.
    async fn find_all(&self) -> Result<Vec<Task>, StorageError>;

    /// Replaces the stored row. Returns [`StorageError::NoRows`] when the
    /// task no longer exists.
    async fn update(&self, task: &Task) -> Result<Task, StorageError>;

    /// Returns [`StorageError::NoRows`] when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<(), StorageError>;

    async fn health(&self) -> ServiceHealth;

    /// Releases connections. Called once during shutdown.
    async fn close(&self) {}
}

/// Opens the backend selected by `STORAGE_BACKEND`.
pub async fn connect(config: &Config) -> Result<Arc<dyn TaskRepository>, StorageError> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let repository = PostgresTaskRepository::connect(&config.database).await?;
            Ok(Arc::new(repository))
        }
        StorageBackend::Redis => {
            let repository = RedisTaskRepository::connect(&config.storage.redis_url).await?;
            Ok(Arc::new(repository))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryTaskRepository::new())),
    }
}
