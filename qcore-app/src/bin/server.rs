//! Thin wrapper binary for running the background work orchestration
//! service as a standalone process.

use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use qcore_app::{bootstrap, router, AppState};
use qcore_shared::{logging, CoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("qcore-app");

    info!("Starting qcore background orchestration service...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = CoreConfig::load()?;
    let app = bootstrap(config).await?;

    let state = AppState::new(&app);
    let running = app.run().await?;

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8085").await?;
    info!(addr = "0.0.0.0:8085", "listening");

    let server = axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal());

    if let Err(err) = server.await {
        error!(error = %err, "server exited with an error");
    }

    info!("Shutdown signal received, stopping orchestration components...");
    match tokio::time::timeout(Duration::from_secs(30), running.stop()).await {
        Ok(()) => info!("Orchestration components stopped cleanly"),
        Err(_) => error!("Graceful shutdown timed out, forcing exit"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
