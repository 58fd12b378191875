use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::de::DeserializeOwned;
use shared::{CreateTaskRequest, TaskResponse, UpdateTaskRequest};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

const RESOURCE: &str = "Task";

/// Syntax errors, wrong types and empty bodies all read as one bad payload.
fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|error| {
        tracing::debug!(%error, "rejecting request body");
        ApiError::invalid_payload()
    })
}

/// Anything that is not a UUID cannot name a stored task.
fn task_id(raw: &str) -> Result<Uuid, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::missing_id(RESOURCE));
    }
    Uuid::parse_str(raw).map_err(|_| ApiError::not_found(RESOURCE))
}

pub async fn create_task(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let request: CreateTaskRequest = decode(&body)?;
    let task = state
        .service
        .create(request)
        .await
        .map_err(|error| ApiError::classify(error, RESOURCE, "Failed to create task"))?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state
        .service
        .get_all()
        .await
        .map_err(|error| ApiError::classify(error, RESOURCE, "Failed to retrieve tasks"))?;

    Ok(Json(tasks))
}

pub async fn get_task(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = task_id(&id)?;
    let task = state
        .service
        .get_by_id(id)
        .await
        .map_err(|error| ApiError::classify(error, RESOURCE, "Failed to retrieve task"))?;

    Ok(Json(task))
}

pub async fn update_task(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = task_id(&id)?;
    let request: UpdateTaskRequest = decode(&body)?;
    let task = state
        .service
        .update(id, request)
        .await
        .map_err(|error| ApiError::classify(error, RESOURCE, "Failed to update task"))?;

    Ok(Json(task))
}

pub async fn delete_task(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let id = task_id(&id)?;
    state
        .service
        .delete(id)
        .await
        .map_err(|error| ApiError::classify(error, RESOURCE, "Failed to delete task"))?;

    Ok(StatusCode::NO_CONTENT)
}
