//! Etymos HTTP server
//!
//! Serves the word store, the offline store and the sync endpoints over
//! JSON.
//!
//! # Configuration
//!
//! Environment variables:
//! - `ETYMOS_PORT`: Port to listen on (default: 8080)
//! - `ETYMOS_CONFIG`: Path to config file (default: ~/.config/etymos/config.yaml)
//! - `ETYMOS_DATABASE_URL`, `ETYMOS_OFFLINE_PATH`, `ETYMOS_MAX_LOCAL_ITEMS`:
//!   override the config file
//!
//! # Endpoints
//!
//! - `GET /health`: Health check
//! - `GET /api/status`: Database reachability (`x-db-url` checks another target)
//! - `GET|POST /api/config`
//! - `GET|POST /api/words`, `GET|DELETE /api/words/{id}`
//! - `GET|POST /api/local`, `DELETE /api/local/{id}`
//! - `POST /api/sync/check`, `POST /api/sync/execute`

use etymos::config::Config;
use etymos::server::{router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "etymos=info,etymos_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = std::env::var("ETYMOS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let config_path = std::env::var("ETYMOS_CONFIG").ok().map(PathBuf::from);

    let config = match Config::load(config_path.clone()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Database: {}", config.database_url.value);
    tracing::info!("Offline store: {}", config.offline_path.value.display());
    tracing::info!("Local item limit: {}", config.max_local_items.value);

    let state = AppState::new(config_path, &config);

    // Open the pool up front so migrations run before the first request.
    // Failure is not fatal; the status endpoint reports it.
    if let Err(e) = state
        .connections
        .acquire(&etymos::db::ConnectionTarget::Configured)
        .await
    {
        tracing::warn!("Database not reachable at startup: {}", e);
    }

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
