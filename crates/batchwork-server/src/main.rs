mod config;
mod routes;
mod state;
mod telemetry;
mod wiring;

use std::sync::Arc;

use anyhow::Context;
use batchwork_core::ports::{Clock, SystemClock};
use tokio::net::TcpListener;
use tracing::info;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = config::load(&args, |key| std::env::var(key).ok()).context("load config")?;
    telemetry::init(&cfg.logging);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let launcher = Arc::new(
        wiring::build_launcher(&cfg, clock.clone())
            .await
            .context("wire job")?,
    );

    let app = routes::build_router(AppState {
        launcher: launcher.clone(),
        clock,
    });

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, job = launcher.job_name(), "batchwork listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    launcher.shutdown().await;
    info!("batchwork stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
