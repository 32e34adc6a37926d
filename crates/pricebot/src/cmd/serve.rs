//! `pricebot serve` - run the API server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use pricebot_api::{AppState, build_router};
use pricebot_config::Config;
use pricebot_extraction::Capabilities;
use pricebot_store::Store;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address override (e.g. 127.0.0.1:8000)
    #[arg(long)]
    bind: Option<String>,
}

pub async fn run(config: Config, args: ServeArgs) -> Result<()> {
    let bind_addr = args
        .bind
        .unwrap_or_else(|| config.server.bind_addr.clone());

    let store = Arc::new(
        Store::open(&config.database.url)
            .await
            .context("opening catalog database")?,
    );

    // Jobs a previous process abandoned mid-flight
    let stale_after = chrono::Duration::seconds(config.ingestion.stale_running_seconds);
    let swept = pricebot_jobs::reconcile_stale_jobs(&store, stale_after).await?;
    if swept > 0 {
        warn!(count = swept, "reconciled jobs abandoned by a previous run");
    }

    let capabilities = match Capabilities::from_config(&config.extraction) {
        Ok(capabilities) => capabilities,
        Err(e) => {
            warn!(error = %e, "extraction capabilities disabled");
            Capabilities::disabled()
        }
    };

    let grace = Duration::from_secs(config.ingestion.shutdown_grace_seconds);
    let state = AppState::assemble(config, store, capabilities);
    let runner = Arc::clone(&state.runner);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "pricebot listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("draining job runner");
    runner.shutdown(grace).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received sigterm"),
    }
}
