//! Redis backend.
//!
//! - `task:{id}` holds the task as JSON
//! - `tasks:index` is a sorted set of ids scored by `created_at` in milliseconds

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use shared::Task;
use uuid::Uuid;

use super::{StorageError, TaskRepository};
use crate::health::ServiceHealth;

const TASK_KEY_PREFIX: &str = "task:";
const TASK_INDEX_KEY: &str = "tasks:index";

fn task_key(id: &Uuid) -> String {
    format!("{TASK_KEY_PREFIX}{id}")
}

fn index_score(task: &Task) -> f64 {
    task.created_at.timestamp_millis() as f64
}

/// Writes the record and its index entry in one transaction. Both writes
/// are `NX`, so an existing id leaves record and score untouched.
fn insert_pipeline(task: &Task, json: &str) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(task_key(&task.id))
        .arg(json)
        .arg("NX")
        .cmd("ZADD")
        .arg(TASK_INDEX_KEY)
        .arg("NX")
        .arg(index_score(task))
        .arg(task.id.to_string());
    pipe
}

#[derive(Clone)]
pub struct RedisTaskRepository {
    connection: ConnectionManager,
}

impl RedisTaskRepository {
    pub async fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        tracing::info!("redis connection established");
        Ok(Self { connection })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl TaskRepository for RedisTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, StorageError> {
        let json = serde_json::to_string(task)?;
        let mut conn = self.connection();

        let (created, _): (Option<String>, i64) =
            insert_pipeline(task, &json).query_async(&mut conn).await?;
        if created.is_none() {
            return Err(StorageError::Duplicate(task.id));
        }
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Task, StorageError> {
        let mut conn = self.connection();
        let data: Option<String> = conn.get(task_key(&id)).await?;

        match data {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Err(StorageError::NoRows),
        }
    }

    async fn find_all(&self) -> Result<Vec<Task>, StorageError> {
        let mut conn = self.connection();
        let ids: Vec<String> = conn.zrevrange(TASK_INDEX_KEY, 0, -1).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| format!("{TASK_KEY_PREFIX}{id}")).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        // Ids whose key is gone are skipped.
        values
            .into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(StorageError::from))
            .collect()
    }

    async fn update(&self, task: &Task) -> Result<Task, StorageError> {
        let json = serde_json::to_string(task)?;
        let mut conn = self.connection();

        let written: Option<String> = redis::cmd("SET")
            .arg(task_key(&task.id))
            .arg(&json)
            .arg("XX")
            .query_async(&mut conn)
            .await?;

        match written {
            Some(_) => Ok(task.clone()),
            None => Err(StorageError::NoRows),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        let mut conn = self.connection();
        let (removed, _): (i64, i64) = redis::pipe()
            .atomic()
            .del(task_key(&id))
            .zrem(TASK_INDEX_KEY, id.to_string())
            .query_async(&mut conn)
            .await?;

        if removed == 0 {
            return Err(StorageError::NoRows);
        }
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        let mut conn = self.connection();
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => ServiceHealth::healthy("Redis connection is active").with_detail("backend", "redis"),
            Err(error) => {
                tracing::warn!(%error, "redis ping failed");
                ServiceHealth::unhealthy("Failed to ping redis")
            }
        }
    }
}
