//! Quote aggregation HTTP service

use anyhow::Context;
use quote_aggregator::{
    providers::build_http_client,
    scheduler::spawn_symbol_refresh,
    server::{app_router, AppState},
    AggregatorConfig, QuoteAggregator,
};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let log_format = std::env::var("QUOTE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received termination signal"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AggregatorConfig::from_env()?;
    init_tracing();

    if config.coinmarketcap_api_key.is_none() {
        tracing::warn!("COINMARKETCAP_API_KEY is not set, supply metadata will be unavailable");
    }

    let client = build_http_client(&config).context("building HTTP client")?;
    let (aggregator, resolver) = QuoteAggregator::from_config(&config, client);

    match resolver.refresh().await {
        Ok(loaded) => tracing::info!(loaded, "Loaded symbol directory"),
        Err(e) => tracing::warn!(error = %e, "Initial symbol refresh failed, starting without mappings"),
    }
    let refresh_task = spawn_symbol_refresh(resolver.clone(), config.symbol_refresh_interval);

    let state = AppState {
        aggregator: Arc::new(aggregator),
        resolver,
    };
    let router = app_router(state);

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    refresh_task.abort();
    tracing::info!("Quote server stopped");
    served?;
    Ok(())
}
