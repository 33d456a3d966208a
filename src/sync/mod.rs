//! Offline-to-repository synchronization.
//!
//! Every offline item goes through a check (is there a stored record for its
//! lemma, and does it differ?) and, when allowed, a write. The write repeats
//! the comparison inside its own transaction, so a record changed after the
//! check is reported as a conflict rather than overwritten.
//!
//! Conflicts are a normal outcome. They count neither as a success nor as a
//! failure, and the offline copy stays in place until the user decides.

mod coordinator;
mod state;

pub use coordinator::SyncCoordinator;
pub use state::{ItemState, Resolution, TransitionError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::conflict::DiffEntry;
use crate::db::RepositoryError;
use crate::models::DocumentError;
use crate::offline::{OfflineError, OfflineRecord};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Failed to remove offline copy: {0}")]
    Offline(#[from] OfflineError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// An offline document submitted for sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    pub id: String,
    #[serde(alias = "raw_yaml")]
    pub raw_yaml: String,
}

impl SyncItem {
    pub fn new(id: impl Into<String>, raw_yaml: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_yaml: raw_yaml.into(),
        }
    }
}

impl From<OfflineRecord> for SyncItem {
    fn from(record: OfflineRecord) -> Self {
        Self {
            id: record.id,
            raw_yaml: record.raw_yaml,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// No stored record; syncing creates one.
    Created,
    /// A stored record exists with the same content.
    Ok,
    Conflict,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lemma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Vec<DiffEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn status(status: CheckStatus, lemma: Option<String>) -> Self {
        Self {
            status,
            lemma,
            diff: None,
            old_data: None,
            new_data: None,
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::status(CheckStatus::Error, None)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCheck {
    pub id: String,
    #[serde(flatten)]
    pub result: CheckResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub item_id: String,
    #[serde(flatten)]
    pub state: ItemState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub item_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub success_count: usize,
    pub failed_count: usize,
    pub conflict_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<ItemError>,
    pub outcomes: Vec<ItemOutcome>,
}
