use anyhow::Result;
use tracing::{error, info};
use weeklybot_core::config::{AppConfig, LoadOptions};
use weeklybot_server::{bootstrap, routes};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use weeklybot_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    // Config first so logging honours its level and format.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = app.config.listen_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "weeklybot-server listening"
    );

    let served = axum::serve(listener, routes::router(app.state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await;
    app.refresh_task.abort();

    if let Err(serve_error) = &served {
        error!(
            event_name = "system.server.error",
            correlation_id = "shutdown",
            error = %serve_error,
            "http server terminated unexpectedly"
        );
    }
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "weeklybot-server stopping");

    served?;
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %signal_error,
            "could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
