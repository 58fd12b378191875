use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::config::Config;
use crate::cors::{apply_cors, CorsPolicy};
use crate::error::{ApiError, ErrorKind};
use crate::handlers::{create_task, delete_task, get_task, list_tasks, update_task};
use crate::health::health_check;
use crate::middleware::log_requests;
use crate::service::TaskService;
use crate::storage::TaskRepository;

const MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TaskService>,
    pub repository: Arc<dyn TaskRepository>,
}

impl AppState {
    pub fn new(repository: Arc<dyn TaskRepository>, query_timeout: Duration) -> Self {
        Self {
            service: Arc::new(TaskService::new(repository.clone(), query_timeout)),
            repository,
        }
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");

    ApiError::new(ErrorKind::Internal, "Internal server error").into_response()
}

pub fn router(state: AppState, config: &Config) -> Router {
    let cors = Arc::new(CorsPolicy::from_config(&config.cors));

    Router::new()
        .route("/health", get(health_check))
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(middleware::from_fn_with_state(cors, apply_cors))
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(TimeoutLayer::new(config.server.request_timeout))
                .layer(middleware::from_fn(log_requests))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
