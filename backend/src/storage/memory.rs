use std::collections::HashMap;

use async_trait::async_trait;
use shared::Task;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StorageError, TaskRepository};
use crate::health::ServiceHealth;

/// Process-local store for development and tests. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTaskRepository {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, StorageError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StorageError::Duplicate(task.id));
        }
        tasks.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Task, StorageError> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StorageError::NoRows)
    }

    async fn find_all(&self) -> Result<Vec<Task>, StorageError> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn update(&self, task: &Task) -> Result<Task, StorageError> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks.get_mut(&task.id).ok_or(StorageError::NoRows)?;
        *stored = task.clone();
        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        self.tasks
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NoRows)
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::healthy("In-memory store is active")
            .with_detail("backend", "memory")
            .with_detail("tasks", self.len().await)
    }
}
