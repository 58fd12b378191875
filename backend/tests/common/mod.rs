#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use shared::Task;
use task_api::health::ServiceHealth;
use task_api::storage::{MemoryTaskRepository, StorageError, TaskRepository};
use task_api::{router, AppState, Config};
use tower::ServiceExt;
use uuid::Uuid;

pub const QUERY_TIMEOUT: Duration = Duration::from_secs(1);

pub fn app_with(repository: Arc<dyn TaskRepository>, config: &Config) -> Router {
    router(AppState::new(repository, QUERY_TIMEOUT), config)
}

pub fn app() -> Router {
    app_with(Arc::new(MemoryTaskRepository::new()), &Config::default())
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Every call fails as if the database were down.
pub struct DownRepository;

#[async_trait]
impl TaskRepository for DownRepository {
    async fn create(&self, _task: &Task) -> Result<Task, StorageError> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }
    async fn find_by_id(&self, _id: Uuid) -> Result<Task, StorageError> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }
    async fn find_all(&self) -> Result<Vec<Task>, StorageError> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }
    async fn update(&self, _task: &Task) -> Result<Task, StorageError> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }
    async fn delete(&self, _id: Uuid) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("connection refused".to_string()))
    }
    async fn health(&self) -> ServiceHealth {
        ServiceHealth::unhealthy("Failed to ping database")
    }
}

/// Lists panic; everything else delegates to memory.
#[derive(Default)]
pub struct PanickingRepository {
    inner: MemoryTaskRepository,
}

#[async_trait]
impl TaskRepository for PanickingRepository {
    async fn create(&self, task: &Task) -> Result<Task, StorageError> {
        self.inner.create(task).await
    }
    async fn find_by_id(&self, id: Uuid) -> Result<Task, StorageError> {
        self.inner.find_by_id(id).await
    }
    async fn find_all(&self) -> Result<Vec<Task>, StorageError> {
        panic!("index corrupted")
    }
    async fn update(&self, task: &Task) -> Result<Task, StorageError> {
        self.inner.update(task).await
    }
    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        self.inner.delete(id).await
    }
    async fn health(&self) -> ServiceHealth {
        self.inner.health().await
    }
}

/// Lists never answer; everything else is empty.
pub struct StalledRepository;

#[async_trait]
impl TaskRepository for StalledRepository {
    async fn create(&self, task: &Task) -> Result<Task, StorageError> {
        Ok(task.clone())
    }
    async fn find_by_id(&self, _id: Uuid) -> Result<Task, StorageError> {
        Err(StorageError::NoRows)
    }
    async fn find_all(&self) -> Result<Vec<Task>, StorageError> {
        std::future::pending().await
    }
    async fn update(&self, _task: &Task) -> Result<Task, StorageError> {
        Err(StorageError::NoRows)
    }
    async fn delete(&self, _id: Uuid) -> Result<(), StorageError> {
        Err(StorageError::NoRows)
    }
    async fn health(&self) -> ServiceHealth {
        ServiceHealth::healthy("stalled")
    }
}
