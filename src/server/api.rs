use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::config::{Config, ConfigUpdate};
use crate::conflict::DiffEntry;
use crate::db::{ConnectionTarget, SaveOutcome, WordRepository};
use crate::models::{ListQuery, Page, WordDocument, WordRecord, WordSummary};
use crate::offline::{LocalSaveOutcome, OfflineRecord};
use crate::sync::{BatchSummary, ItemCheck, Resolution, SyncCoordinator, SyncItem};

pub const DB_URL_HEADER: &str = "x-db-url";

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connection check. An `x-db-url` header checks that target on an isolated
/// connection instead of the configured one.
pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> Json<StatusResponse> {
    let target = ConnectionTarget::from_override(
        headers.get(DB_URL_HEADER).and_then(|h| h.to_str().ok()),
    );

    let result = match state.connections.acquire(&target).await {
        Ok(handle) => {
            let ping = handle.ping().await;
            handle.release().await;
            ping.map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    };

    Json(match result {
        Ok(()) => StatusResponse {
            connected: true,
            error: None,
        },
        Err(error) => {
            tracing::warn!(error = %error, "Status check failed");
            StatusResponse {
                connected: false,
                error: Some(error),
            }
        }
    })
}

pub async fn get_config(State(state): State<AppState>) -> Result<Json<Config>, ApiError> {
    Ok(Json(Config::load(state.config_path.clone())?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Merges new settings into the config file, then re-targets the connection
/// cache and the offline store.
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<SuccessResponse>, ApiError> {
    Config::update(state.config_path.clone(), update)?;
    let config = Config::load(state.config_path.clone())?;
    state.apply_config(&config).await;
    Ok(Json(SuccessResponse { success: true }))
}

async fn repository(state: &AppState) -> Result<WordRepository, ApiError> {
    let handle = state.connections.acquire(&ConnectionTarget::Configured).await?;
    Ok(WordRepository::new(handle.pool().clone()))
}

pub async fn list_words(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<WordSummary>>, ApiError> {
    let repo = repository(&state).await?;
    Ok(Json(repo.list(&query).await?))
}

pub async fn get_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WordRecord>, ApiError> {
    let repo = repository(&state).await?;
    repo.get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("word {}", id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWordRequest {
    pub yaml: String,
    #[serde(default, alias = "force")]
    pub force_update: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWordResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Vec<DiffEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_data: Option<Value>,
}

impl SaveWordResponse {
    fn saved(id: String, lemma: Option<String>, status: impl ToString) -> Self {
        Self {
            success: Some(true),
            status: status.to_string(),
            id: Some(id),
            lemma,
            diff: None,
            old_data: None,
            new_data: None,
        }
    }

    fn conflict(id: String, diff: Vec<DiffEntry>, old_data: Value, new_data: Value) -> Self {
        Self {
            success: None,
            status: "conflict".to_string(),
            id: Some(id),
            lemma: None,
            diff: Some(diff),
            old_data: Some(old_data),
            new_data: Some(new_data),
        }
    }
}

/// Saves a document straight to the repository. Conflicts come back as a
/// normal response so the caller can decide.
pub async fn save_word(
    State(state): State<AppState>,
    Json(request): Json<SaveWordRequest>,
) -> Result<Json<SaveWordResponse>, ApiError> {
    let doc = WordDocument::parse(&request.yaml)?;
    let repo = repository(&state).await?;

    let response = match repo.save(&doc, request.force_update).await? {
        SaveOutcome::Saved { id, lemma, status } => {
            SaveWordResponse::saved(id.to_string(), Some(lemma), status)
        }
        SaveOutcome::Conflict {
            existing_id,
            report,
            old_data,
            new_data,
        } => SaveWordResponse::conflict(existing_id.to_string(), report.diff, old_data, new_data),
    };
    Ok(Json(response))
}

pub async fn delete_word(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let repo = repository(&state).await?;
    if !repo.delete(id).await? {
        return Err(ApiError::not_found(format!("word {}", id)));
    }
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn list_local(State(state): State<AppState>) -> Result<Json<Vec<OfflineRecord>>, ApiError> {
    let offline = state.offline.lock().await;
    Ok(Json(offline.list()?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLocalRequest {
    pub yaml: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub force_update: bool,
}

pub async fn save_local(
    State(state): State<AppState>,
    Json(request): Json<SaveLocalRequest>,
) -> Result<Json<SaveWordResponse>, ApiError> {
    let offline = state.offline.lock().await;
    let outcome = offline.save_checked(&request.yaml, request.id.as_deref(), request.force_update)?;

    let response = match outcome {
        LocalSaveOutcome::Conflict {
            id,
            report,
            old_data,
            new_data,
        } => SaveWordResponse::conflict(id, report.diff, old_data, new_data),
        other => {
            let status = other.status();
            SaveWordResponse::saved(other.id().to_string(), None, status)
        }
    };
    Ok(Json(response))
}

pub async fn delete_local(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let offline = state.offline.lock().await;
    offline.delete(&id)?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub items: Vec<SyncItem>,
}

pub async fn sync_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<Vec<ItemCheck>>, ApiError> {
    let repo = reachable_repository(&state).await?;
    let offline = state.offline.lock().await;
    let coordinator = SyncCoordinator::new(&repo, &offline);
    Ok(Json(coordinator.check_many(&request.items).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub items: Vec<SyncItem>,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub decisions: Option<HashMap<String, Resolution>>,
}

pub async fn sync_execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<BatchSummary>, ApiError> {
    let repo = reachable_repository(&state).await?;
    let offline = state.offline.lock().await;
    let coordinator = SyncCoordinator::new(&repo, &offline);

    let summary = match &request.decisions {
        Some(decisions) => coordinator.apply_decisions(&request.items, decisions).await,
        None => {
            coordinator
                .execute_many(&request.items, request.force_update)
                .await
        }
    };
    Ok(Json(summary))
}

// Batches fail as a whole when the database cannot be reached at all.
async fn reachable_repository(state: &AppState) -> Result<WordRepository, ApiError> {
    let handle = state.connections.acquire(&ConnectionTarget::Configured).await?;
    handle
        .ping()
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(WordRepository::new(handle.pool().clone()))
}
