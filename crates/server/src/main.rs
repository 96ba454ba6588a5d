mod bootstrap;
mod cache;
mod directions;
mod error;
mod health;
mod origin;
mod proxy;
mod quote;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use islandhop_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

fn init_logging(config: &AppConfig) {
    use islandhop_core::config::LogFormat::*;
    use tracing::Level;

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

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap emits its first event.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let routes = Router::new()
        .merge(health::router(app.health))
        .merge(quote::router(app.quote))
        .merge(proxy::router(app.proxy))
        .layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "islandhop-server listening"
    );
    let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let server = axum::serve(listener, routes)
        .with_graceful_shutdown(async move { signal.notified().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        () = wait_for_shutdown() => {
            shutdown.notify_one();
            match tokio::time::timeout(drain, &mut server).await {
                Ok(result) => result?,
                Err(_) => tracing::warn!(
                    event_name = "system.server.drain_timeout",
                    correlation_id = "shutdown",
                    drain_secs = drain.as_secs(),
                    "in-flight requests did not finish before the drain deadline"
                ),
            }
        }
    }
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "islandhop-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
