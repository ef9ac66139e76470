use livesync::config::AppConfig;
use livesync::logging;
use livesync::services::ServiceContainer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    let _log_guard = logging::init_logging(&config.logging)?;
    for warning in &config.warnings {
        warn!("{warning}");
    }

    let store = if config.postgrest.is_some() {
        "postgrest"
    } else {
        "sqlite"
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        store,
        port = config.api.port,
        "Starting livesync"
    );

    let mut container = ServiceContainer::from_config(config).await?;
    container.start().await?;

    shutdown_signal().await;

    container.shutdown().await?;
    Ok(())
}

/// Wait for SIGTERM or Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
