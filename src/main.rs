use std::path::PathBuf;

use axum::routing::get;
use finassist::config::Configuration;
use finassist::{app, initialize_state, telemetry};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_PATH: &str = "CONFIG_PATH";
const OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Export traces only when a collector is configured.
    let tracer = if std::env::var(OTLP_ENDPOINT).is_ok() {
        let provider = telemetry::setup_tracer()?;
        opentelemetry::global::set_tracer_provider(provider.clone());
        Some(provider)
    } else {
        None
    };

    let mut config = Configuration::default();
    if let Ok(path) = std::env::var(CONFIG_PATH) {
        config = config.path(PathBuf::from(path));
    }
    let config = config.read()?;

    let state = initialize_state(config.clone()).await?;
    let mut router = app(state);

    match telemetry::setup_metrics_recorder() {
        Ok(handle) => {
            router = router.route("/metrics", get(move || std::future::ready(handle.render())));
        },
        Err(err) => tracing::warn!(error = %err, "prometheus recorder not installed"),
    }

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, version = config.version(), "server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(provider) = tracer {
        if let Err(err) = provider.shutdown() {
            tracing::error!(error = %err, "cannot flush traces");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
