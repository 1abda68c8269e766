use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rest2sftp::config::ServerConfig;
use rest2sftp::{build_router, Gateway};
use rest2sftp_core::session::SessionProvider;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ServerConfig::parse();
    info!("rest2sftp {} starting", VERSION);

    let connector = config
        .connector()
        .context("Invalid remote configuration")?;
    let target = connector.describe();
    let (sessions, pool) = config.session_provider(connector);
    info!(target_host = %target, mode = sessions.mode(), "session provider ready");

    if config.skip_startup_check {
        warn!("skipping startup connectivity check");
    } else {
        startup_check(sessions.as_ref())
            .await
            .with_context(|| format!("Startup check against {target} failed"))?;
        info!(target_host = %target, "remote side reachable");
    }

    let gateway = Arc::new(Gateway::new(sessions, &config));
    info!(
        base_path = gateway.resolver.base(),
        prefix_match = ?config.prefix_match,
        error_mode = ?config.error_mode,
        "gateway configured"
    );
    let router = build_router(gateway, config.max_upload_bytes);

    let address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("listening on {}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Some(pool) = pool {
        tokio::task::spawn_blocking(move || pool.close()).await?;
    }
    info!("rest2sftp stopped");
    Ok(())
}

/// Open one session and release it again.
async fn startup_check(sessions: &dyn SessionProvider) -> anyhow::Result<()> {
    let handle = sessions.acquire().await?;
    tokio::task::spawn_blocking(move || drop(handle)).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
