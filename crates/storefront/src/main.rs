//! Q-Mart Storefront - Order and payment API.
//!
//! This binary serves the checkout and order management API on port 7000.
//!
//! # Architecture
//!
//! - Axum web framework with JSON request and response bodies
//! - `PostgreSQL` for orders, the payment ledger and directory lookups, or
//!   in-memory stores for local development
//! - Razorpay-compatible gateway for online payments, verified with HMAC-SHA256
//! - SMTP (lettre) for order confirmations, logged only when not configured

#![cfg_attr(not(test), forbid(unsafe_code))]

use qmart_storefront::config::{LogFormat, StorageBackend, StorefrontConfig};
use qmart_storefront::db;
use qmart_storefront::state::{AppState, Integrations, Stores};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "qmart_storefront=info,tower_http=debug".into());

    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

async fn build_stores(config: &StorefrontConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    match (config.storage, &config.database_url) {
        (StorageBackend::Postgres, Some(url)) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");
            Ok(Stores::postgres(pool))
        }
        (StorageBackend::Postgres, None) => Err("postgres storage selected without a database URL".into()),
        (StorageBackend::Memory, _) => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Ok(Stores::in_memory())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env()?;

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p qmart-cli -- migrate
    let stores = build_stores(&config).await?;
    let integrations = Integrations::from_config(&config)?;
    let state = AppState::new(stores, integrations);

    let app = qmart_storefront::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
