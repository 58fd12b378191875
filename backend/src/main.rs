use std::future::IntoFuture;
use std::net::SocketAddr;
use std::process::ExitCode;

use task_api::config::StorageBackend;
use task_api::{logging, router, storage, AppState, Config};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = logging::init(&config.log) {
        eprintln!("failed to initialise logging: {error}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        environment = %config.server.environment,
        address = %config.server.address,
        storage = ?config.storage.backend,
        log_level = %config.log.level,
        log_format = ?config.log.format,
        "starting task-api"
    );

    if config.is_production() && config.storage.backend == StorageBackend::Memory {
        tracing::warn!("in-memory storage selected in production; tasks are lost on restart");
    }

    let repository = match storage::connect(&config).await {
        Ok(repository) => repository,
        Err(error) => {
            tracing::error!(%error, "failed to connect to storage");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(repository.clone(), config.database.query_timeout);
    let app = router(state, &config);

    let listener = match TcpListener::bind(config.server.address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, address = %config.server.address, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(address = %config.server.address, "server listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut graceful_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.wait_for(|stop| *stop).await;
        })
        .into_future();

    let drain_deadline = async {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        tokio::time::sleep(config.server.shutdown_timeout).await;
    };

    let mut code = ExitCode::SUCCESS;
    tokio::select! {
        result = server => {
            if let Err(error) = result {
                tracing::error!(%error, "server error");
                code = ExitCode::FAILURE;
            }
        }
        () = drain_deadline => {
            tracing::warn!(
                timeout = ?config.server.shutdown_timeout,
                "in-flight requests did not finish in time"
            );
        }
    }

    repository.close().await;
    tracing::info!("server stopped");
    code
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
