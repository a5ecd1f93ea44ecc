//! Log Storage Main Entry Point
//!
//! Consumes structured log records from Kafka and stores them into
//! OpenSearch. With `WORKERS` above one the process supervises that many
//! copies of itself instead.

use dotenv::dotenv;
use log_storage::orchestrator::wait_for_shutdown_signal;
use log_storage::supervisor::{self, wait_for_supervisor_exit};
use log_storage::{Dependencies, LogStorageError, Settings};
use std::env;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Time given to the dead-letter producer to flush at exit.
const PRODUCER_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("log_storage=info,log_storage_repository=info"));

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();
    }

    info!(
        service_name = "log-storage",
        service_version = env!("CARGO_PKG_VERSION"),
        worker_id = ?supervisor::worker_id(),
        json,
        "Tracing initialized"
    );
}

#[tokio::main]
async fn main() -> Result<(), LogStorageError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e);
        }
    };

    let worker_id = supervisor::worker_id();
    if settings.workers > 1 && worker_id.is_none() {
        info!(workers = settings.workers, "Starting log storage supervisor");
        let grace = settings.orchestrator.drain_timeout + Duration::from_secs(15);
        return supervisor::supervise(settings.workers, grace).await;
    }

    info!("Starting log storage");

    let mut deps = match Dependencies::new(&settings).await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    let shutdown = deps.orchestrator.shutdown_handle();
    tokio::spawn(async move {
        if worker_id.is_some() {
            tokio::select! {
                _ = wait_for_shutdown_signal() => {}
                _ = wait_for_supervisor_exit() => info!("Supervisor asked for shutdown"),
            }
        } else {
            wait_for_shutdown_signal().await;
        }
        shutdown.shutdown();
    });

    let result = deps.orchestrator.run().await;
    deps.close(PRODUCER_FLUSH_TIMEOUT).await;

    match result {
        Ok(()) => {
            info!("Log storage stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Log storage failed");
            Err(e.into())
        }
    }
}
