//! Fournil storefront - bakery click-and-collect API.
//!
//! This binary serves the storefront JSON API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - Catalog, orders, payments and accounts behind the `Store` repository
//!   traits: `PostgreSQL` when a database URL is configured, in memory
//!   (seeded with the demo catalog) otherwise
//! - Cart, checkout wizard and order history held in tower-sessions
//! - Simulated payment gateway
//! - Background sweep cancelling orders left unpaid past their TTL
//!
//! Migrations are not run on startup. Run them with `fournil-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use fournil_storefront::config::StorefrontConfig;
use fournil_storefront::db::seed::{SeedData, SeedError};
use fournil_storefront::db::{self, MemoryStore, PgStore, Store};
use fournil_storefront::middleware::create_session_layer;
use fournil_storefront::services::orders::spawn_pending_order_sweeper;
use fournil_storefront::state::AppState;
use fournil_storefront::build_router;
use sentry::integrations::tracing as sentry_tracing;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("demo seed failed: {0}")]
    Seed(#[from] SeedError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

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

    tracing::info!("Sentry initialized");
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

/// Initialize tracing with `EnvFilter` and Sentry integration.
///
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fournil_storefront=info,tower_http=debug".into());

    let is_json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let json_layer = is_json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from environment (needed for Sentry init)
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Failed to load configuration: {e}");
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Storefront stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: StorefrontConfig) -> Result<(), StartupError> {
    let app = if let Some(database_url) = &config.database_url {
        let pool = db::create_pool(database_url).await?;
        tracing::info!("Database pool created");

        let session_layer = create_session_layer(PostgresStore::new(pool.clone()), &config);
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        spawn_pending_order_sweeper(Arc::clone(&store), &config.orders);
        let state = AppState::new(config.clone(), store);
        build_router(state, session_layer)
    } else {
        tracing::warn!("No database configured, using the in-memory store");
        let store = Arc::new(MemoryStore::new());
        if config.seed_demo {
            let result = SeedData::demo()?.apply(store.as_ref()).await?;
            tracing::info!(inserted = result.inserted, "Demo catalog loaded");
        }

        let session_layer =
            create_session_layer(tower_sessions::MemoryStore::default(), &config);
        spawn_pending_order_sweeper(Arc::clone(&store) as Arc<dyn Store>, &config.orders);
        let state = AppState::new(config.clone(), store);
        build_router(state, session_layer)
    };

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
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
                tracing::error!(error = %e, "Failed to install signal handler");
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
