pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod error;
pub mod llm;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use config::Config;
use error::StartupError;
use state::AppState;
use tracing_subscriber::EnvFilter;

/// Initialise logging, read configuration from the environment and serve
/// until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    tracing::info!(?config, "starting pdf-chat");
    serve(config).await
}

pub async fn serve(config: Config) -> Result<(), StartupError> {
    let state = AppState::from_config(&config)?;
    let app = commands::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
