use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::app::AppState;
use crate::error::ErrorKind;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health of one dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl ServiceHealth {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub services: BTreeMap<String, ServiceHealth>,
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, state.repository.health())
        .await
        .unwrap_or_else(|_| ServiceHealth::unhealthy("Database health check timed out"));

    let status = database.status;
    let body = HealthResponse {
        status,
        services: BTreeMap::from([("database".to_string(), database)]),
    };

    match status {
        HealthStatus::Healthy => (StatusCode::OK, Json(body)).into_response(),
        HealthStatus::Unhealthy => {
            tracing::warn!("health check failed: database unhealthy");
            (ErrorKind::Unavailable.status(), Json(body)).into_response()
        }
    }
}
