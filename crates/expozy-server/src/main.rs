//! # Expozy Orchestrator
//!
//! Process entry point. Loads configuration, builds the Store/Queue/
//! Model/Ingest/Worker handles (`app::build`), and runs the ingest HTTP
//! server alongside the worker pool until a shutdown signal arrives:
//! init logging, load config, build, serve with graceful shutdown.

mod app;
mod telegram;

use expozy_config::ConfigLoader;
use expozy_core::telemetry::init_telemetry;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("fatal error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ConfigLoader::from_default_location()?;

    init_telemetry(&config.observability.to_telemetry_config(&config.app.name))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    info!(
        name = %config.app.name,
        version = %config.app.version,
        environment = %config.app.environment,
        "starting expozy-orchestrator"
    );

    let app::App { router, worker_pool } = app::build(&config).await?;
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr()).await?;
    info!(addr = %config.server.bind_addr(), "ingest server listening");

    let shutdown = worker_pool.shutdown_handle();
    let worker_handle = tokio::spawn(async move { worker_pool.run().await });

    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!(error = %err, "ingest server error");
    }

    info!("ingest server stopped, signaling worker pool to drain and stop");
    shutdown.shutdown();
    if let Err(err) = worker_handle.await {
        error!(error = %err, "worker pool task panicked");
    }

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("received terminate signal, initiating graceful shutdown");
        }
    }
}
