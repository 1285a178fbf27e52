mod config;
mod wiring;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use core_sim::SimulationController;
use runtime::{
    export_trades_to_path, spawn_session, SessionHandle, SessionOptions, SessionSummary,
    TracingRunLogWriter,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = config::Cli::parse();
    let sim_config = cli
        .sim_config()
        .context("invalid simulator configuration")?;
    let controller = SimulationController::new(sim_config).context("failed to start simulator")?;

    let session = spawn_session(
        controller,
        TracingRunLogWriter,
        SessionOptions {
            snapshot_window: cli.snapshot_window,
        },
    );
    let handle = session.handle();

    let listener = TcpListener::bind(cli.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen_addr))?;
    tracing::info!(addr = %cli.listen_addr, "simulator listening");

    axum::serve(
        listener,
        wiring::build_app(handle.clone(), cli.snapshot_window),
    )
    .with_graceful_shutdown(shutdown_signal(handle.clone()))
    .await
    .context("http server failed")?;

    handle.stop().await.context("session ended unexpectedly")?;
    drop(handle);
    let summary = session.join().await.context("session task failed")?;

    write_trades(&cli.trades_output, &summary)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves once the session has stopped, either by itself or because
/// Ctrl+C stopped it. Open event streams close on stop, which lets the
/// graceful shutdown complete.
async fn shutdown_signal(session: SessionHandle) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
            if let Err(err) = session.stop().await {
                tracing::warn!(error = %err, "failed to stop session");
            }
        }
        () = session.wait_stopped() => {}
    }
}

fn write_trades(path: &Path, summary: &SessionSummary) -> anyhow::Result<()> {
    let written = export_trades_to_path(
        path,
        &summary.trades,
        summary.status.tick,
        &mut TracingRunLogWriter,
    )
    .with_context(|| format!("failed to export trades to {}", path.display()))?;

    match written {
        Some(rows) => tracing::info!(rows, path = %path.display(), "trades exported"),
        None => tracing::info!("no closed trades, skipping export"),
    }
    tracing::info!(
        ticks = summary.status.tick,
        realized_pnl = summary.status.position.realized_pnl,
        "session finished"
    );
    Ok(())
}
