//! HTTP surface for the word store.
//!
//! Handlers are thin: they acquire a connection, build a repository or a
//! sync coordinator, and translate the result into JSON. All JSON is
//! camelCase.

mod api;
mod error;

use axum::routing::{delete, get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use api::{StatusResponse, DB_URL_HEADER};
pub use error::ApiError;

use crate::config::Config;
use crate::db::ConnectionManager;
use crate::offline::OfflineStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Config file updated by `POST /api/config`. `None` means the default path.
    pub config_path: Option<PathBuf>,
    pub connections: Arc<ConnectionManager>,
    pub offline: Arc<Mutex<OfflineStore>>,
}

impl AppState {
    pub fn new(config_path: Option<PathBuf>, config: &Config) -> Self {
        Self {
            config_path,
            connections: Arc::new(ConnectionManager::new(Some(
                config.database_url.value.clone(),
            ))),
            offline: Arc::new(Mutex::new(OfflineStore::new(
                config.offline_path.value.clone(),
                config.max_local_items.value,
            ))),
        }
    }

    /// Re-targets the connection cache and the offline store after a config change.
    pub async fn apply_config(&self, config: &Config) {
        self.connections
            .reconfigure(Some(config.database_url.value.clone()))
            .await;

        let mut offline = self.offline.lock().await;
        if offline.path() != config.offline_path.value.as_path() {
            *offline = OfflineStore::new(
                config.offline_path.value.clone(),
                config.max_local_items.value,
            );
        } else {
            offline.set_limit(config.max_local_items.value);
        }
        tracing::info!(
            database_url = %config.database_url.value,
            limit = config.max_local_items.value,
            "Applied configuration"
        );
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/status", get(api::status))
        .route("/api/config", get(api::get_config).post(api::update_config))
        .route("/api/words", get(api::list_words).post(api::save_word))
        .route(
            "/api/words/{id}",
            get(api::get_word).delete(api::delete_word),
        )
        .route("/api/local", get(api::list_local).post(api::save_local))
        .route("/api/local/{id}", delete(api::delete_local))
        .route("/api/sync/check", post(api::sync_check))
        .route("/api/sync/execute", post(api::sync_execute))
        .with_state(state)
}
