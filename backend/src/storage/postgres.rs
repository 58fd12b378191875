//! PostgreSQL backend on a bounded `sqlx` pool.
//!
//! Schema lives in `backend/migrations` and is applied at startup when
//! `DB_RUN_MIGRATIONS` is set.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{Task, TaskStatus};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{StorageError, TaskRepository};
use crate::config::DatabaseConfig;
use crate::health::ServiceHealth;

const CONNECT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StorageError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status: TaskStatus = row
            .status
            .parse()
            .map_err(|_| StorageError::Corrupt(format!("task {} has status {:?}", row.id, row.status)))?;

        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the pool, checks the connection and applies pending migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = pool_options(config).connect_with(connect_options(config)?).await?;

        tokio::time::timeout(CONNECT_CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(&pool))
            .await
            .map_err(|_| StorageError::Unavailable("database ping timed out".to_string()))??;

        if config.run_migrations {
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("database migrations applied");
        }

        tracing::info!(
            host = %config.host,
            database = %config.name,
            max_open_conns = config.max_open_conns,
            "database connection established"
        );
        Ok(Self::new(pool))
    }
}

fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, StorageError> {
    let ssl_mode: PgSslMode = config.ssl_mode.parse()?;
    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.name)
        .ssl_mode(ssl_mode))
}

/// Zero lifetimes mean "no limit".
fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    let max_connections = config.max_open_conns.max(1);
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(config.max_idle_conns.min(max_connections))
        .max_lifetime(non_zero(config.conn_max_lifetime))
        .idle_timeout(non_zero(config.conn_max_idle_time))
        .acquire_timeout(config.query_timeout)
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, StorageError> {
        let row: TaskRow = sqlx::query_as(
            r#"
            INSERT INTO tasks (id, title, description, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, description, status, created_at, updated_at
            "#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Task, StorageError> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT id, title, description, status, created_at, updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StorageError::NoRows)?.try_into()
    }

    async fn find_all(&self) -> Result<Vec<Task>, StorageError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT id, title, description, status, created_at, updated_at
            FROM tasks
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Task::try_from).collect()
    }

    async fn update(&self, task: &Task) -> Result<Task, StorageError> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            UPDATE tasks
            SET title = $1, description = $2, status = $3, updated_at = $4
            WHERE id = $5
            RETURNING id, title, description, status, created_at, updated_at
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.updated_at)
        .bind(task.id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StorageError::NoRows)?.try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NoRows);
        }
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        if let Err(error) = sqlx::query("SELECT 1").execute(&self.pool).await {
            tracing::warn!(%error, "database ping failed");
            return ServiceHealth::unhealthy("Failed to ping database");
        }

        let open = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        ServiceHealth::healthy("Database connection is active")
            .with_detail("open_connections", open)
            .with_detail("in_use", open.saturating_sub(idle))
            .with_detail("idle", idle)
            .with_detail("max_open", self.pool.options().get_max_connections())
    }

    async fn close(&self) {
        tracing::info!("closing database connection pool");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use shared::timestamp_now;

    fn row(status: &str) -> TaskRow {
        let now = timestamp_now();
        TaskRow {
            id: Uuid::new_v4(),
            title: "Ship it".to_string(),
            description: String::new(),
            status: status.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_into_task() {
        let task = Task::try_from(row("in_progress")).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.title, "Ship it");
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let error = Task::try_from(row("archived")).unwrap_err();
        assert!(matches!(error, StorageError::Corrupt(_)));
    }

    #[test]
    fn pool_respects_configured_bounds() {
        let mut config = Config::default().database;
        config.max_open_conns = 4;
        config.max_idle_conns = 10;
        config.conn_max_idle_time = Duration::ZERO;

        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_min_connections(), 4);
        assert_eq!(options.get_max_lifetime(), Some(Duration::from_secs(300)));
        assert_eq!(options.get_idle_timeout(), None);
    }

    #[test]
    fn rejects_unknown_ssl_mode() {
        let mut config = Config::default().database;
        config.ssl_mode = "sometimes".to_string();

        assert!(matches!(
            connect_options(&config).unwrap_err(),
            StorageError::Database(_)
        ));
    }
}
