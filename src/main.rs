//! gate-pass server entry point.
//!
//! Builds the configured store, cache, and gateway client, starts the
//! reservation sweeper, and serves the REST API until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use gate_pass::api;
use gate_pass::app_state::AppState;
use gate_pass::cache::{InMemoryCache, RedisCache, ValidationCache};
use gate_pass::config::{AppConfig, CacheBackend, LogFormat, StoreBackend};
use gate_pass::gateway::{HttpPaymentGateway, WebhookVerifier};
use gate_pass::persistence::{InMemoryStore, InventoryStore, PostgresStore};
use gate_pass::service::{CheckoutSettings, ReservationSweeper};

/// Upper bound for any single HTTP request, above the gateway deadline.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting gate-pass");

    // Build backends
    let store: Arc<dyn InventoryStore> = match config.store_backend {
        StoreBackend::Postgres => Arc::new(
            PostgresStore::connect(
                &config.database_url,
                config.database_max_connections,
                config.database_min_connections,
                Duration::from_secs(config.database_connect_timeout_secs),
            )
            .await
            .context("connecting to PostgreSQL")?,
        ),
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; sales will not survive a restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let cache: Arc<dyn ValidationCache> = match config.cache_backend {
        CacheBackend::Redis => Arc::new(
            RedisCache::connect(&config.redis_url, config.cache_ttl())
                .await
                .context("connecting to Redis")?,
        ),
        CacheBackend::Memory => Arc::new(InMemoryCache::new(
            config.cache_ttl(),
            config.cache_max_entries,
        )),
    };

    let gateway = Arc::new(
        HttpPaymentGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_api_key.clone(),
            config.gateway_timeout(),
        )
        .context("building payment gateway client")?,
    );

    let verifier = WebhookVerifier::new(config.webhook_secret.clone());
    if !verifier.is_enabled() {
        tracing::warn!("WEBHOOK_SECRET is not set; webhook requests are not authenticated");
    }

    // Build service layer
    let settings = CheckoutSettings {
        gateway_timeout: config.gateway_timeout(),
        payment_due_days: config.payment_due_days,
        redemption_code_max_attempts: config.redemption_code_max_attempts,
    };
    let app_state = AppState::new(Arc::clone(&store), cache, gateway, settings, verifier);

    // Background sweep
    let sweeper = ReservationSweeper::new(
        Arc::clone(&store),
        config.reservation_ttl(),
        config.sweep_interval(),
    )
    .spawn();

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(
            config.gateway_timeout() + REQUEST_TIMEOUT_MARGIN,
        ))
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
