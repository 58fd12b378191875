//! Task use cases.
//!
//! The service validates input before touching storage, merges partial
//! updates in memory so every write carries complete field values, and is
//! the only place a storage "no rows" becomes [`ServiceError::NotFound`].
//!
//! Updates are read-merge-write with no version check: two concurrent
//! updates of the same task race and the last write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shared::{timestamp_now, CreateTaskRequest, TaskPatch, TaskResponse, UpdateTaskRequest};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::storage::{StorageError, TaskRepository};

impl From<StorageError> for ServiceError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NoRows => ServiceError::NotFound,
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

pub struct TaskService {
    repository: Arc<dyn TaskRepository>,
    timeout: Duration,
}

impl TaskService {
    /// `timeout` bounds each storage call.
    pub fn new(repository: Arc<dyn TaskRepository>, timeout: Duration) -> Self {
        Self {
            repository,
            timeout,
        }
    }

    pub async fn create(&self, request: CreateTaskRequest) -> Result<TaskResponse, ServiceError> {
        let task = request.into_task(timestamp_now())?;
        let created = self
            .storage("create task", self.repository.create(&task))
            .await?;

        tracing::debug!(task_id = %created.id, "task created");
        Ok(created.into())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<TaskResponse, ServiceError> {
        let task = self
            .storage("get task", self.repository.find_by_id(id))
            .await?;
        Ok(task.into())
    }

    pub async fn get_all(&self) -> Result<Vec<TaskResponse>, ServiceError> {
        let tasks = self
            .storage("list tasks", self.repository.find_all())
            .await?;
        Ok(tasks.into_iter().map(TaskResponse::from).collect())
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateTaskRequest,
    ) -> Result<TaskResponse, ServiceError> {
        let patch = TaskPatch::try_from(request)?;
        let mut task = self
            .storage("get task", self.repository.find_by_id(id))
            .await?;

        task.apply(patch, timestamp_now());
        let updated = self
            .storage("update task", self.repository.update(&task))
            .await?;

        tracing::debug!(task_id = %updated.id, status = %updated.status, "task updated");
        Ok(updated.into())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.storage("delete task", self.repository.delete(id))
            .await?;

        tracing::debug!(task_id = %id, "task deleted");
        Ok(())
    }

    async fn storage<T, F>(&self, operation: &'static str, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::Internal(format!(
                "{operation} timed out after {:?}",
                self.timeout
            ))),
        }
    }
}
