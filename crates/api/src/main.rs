use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use billfold_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Variables already set in the process environment win over `.env`.
    let dotenv = dotenvy::dotenv();
    billfold_observability::init();
    match dotenv {
        Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env"),
    }

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    let services = billfold_api::app::services::build_services(&config)
        .await
        .context("failed to initialize ledger storage")?;
    tracing::info!(backend = services.backend_name(), "ledger storage ready");

    let app = billfold_api::app::build_app(Arc::new(services));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
