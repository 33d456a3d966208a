//! Bounded local cache of word documents that have not been synced yet.
//!
//! Records live in a single JSON file, newest first. The store assumes a
//! single writer; callers sharing it across tasks wrap it in a mutex.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::conflict::{self, ConflictReport};
use crate::models::{extract_lemma_preview, DocumentError, WordDocument};

pub const DEFAULT_MAX_LOCAL_ITEMS: usize = 100;

#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Local storage limit reached ({limit}). Please sync or delete items.")]
    CapacityExceeded { limit: usize },

    #[error("IO error at {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Offline store at {0} is corrupt: {1}")]
    Corrupt(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode offline store: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OfflineRecord {
    pub id: String,
    #[serde(alias = "raw_yaml")]
    pub raw_yaml: String,
    #[serde(alias = "lemma_preview", default)]
    pub lemma_preview: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(alias = "updated_at")]
    pub updated_at: i64,
}

impl OfflineRecord {
    /// Stored preview, or a fresh best-effort extraction when none was stored.
    pub fn lemma(&self) -> Option<String> {
        self.lemma_preview
            .clone()
            .or_else(|| extract_lemma_preview(&self.raw_yaml))
    }
}

/// Result of a conflict-aware local save.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalSaveOutcome {
    /// A new record was created.
    Saved { id: String },
    /// An existing record was rewritten in place.
    Updated { id: String },
    /// A record with identical content already exists; nothing was written.
    Logged { id: String },
    /// The stored copy differs. Nothing was written.
    Conflict {
        id: String,
        report: ConflictReport,
        old_data: Value,
        new_data: Value,
    },
}

impl LocalSaveOutcome {
    pub fn id(&self) -> &str {
        match self {
            LocalSaveOutcome::Saved { id }
            | LocalSaveOutcome::Updated { id }
            | LocalSaveOutcome::Logged { id }
            | LocalSaveOutcome::Conflict { id, .. } => id,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            LocalSaveOutcome::Saved { .. } => "local_saved",
            LocalSaveOutcome::Updated { .. } => "updated",
            LocalSaveOutcome::Logged { .. } => "logged",
            LocalSaveOutcome::Conflict { .. } => "conflict",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OfflineStore {
    path: PathBuf,
    limit: usize,
}

impl OfflineStore {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Changes the cap. Existing records above a lower cap are kept; only new
    /// creations are refused.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// All records, most recently modified first.
    pub fn list(&self) -> Result<Vec<OfflineRecord>, OfflineError> {
        let mut records = self.read()?;
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    pub fn len(&self) -> Result<usize, OfflineError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, OfflineError> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<OfflineRecord>, OfflineError> {
        Ok(self.read()?.into_iter().find(|r| r.id == id))
    }

    /// Case-insensitive lookup against the lemma preview.
    pub fn find_by_lemma(&self, lemma: &str) -> Result<Option<OfflineRecord>, OfflineError> {
        let target = lemma.trim().to_lowercase();
        if target.is_empty() {
            return Ok(None);
        }
        Ok(self.list()?.into_iter().find(|record| {
            record
                .lemma()
                .is_some_and(|preview| preview.to_lowercase() == target)
        }))
    }

    /// Stores raw document text and returns the record id.
    ///
    /// An `existing_id` that matches a stored record replaces it in place and
    /// moves it to the front. Anything else creates a new record, which fails
    /// with [`OfflineError::CapacityExceeded`] once the store is full.
    pub fn save(&self, raw: &str, existing_id: Option<&str>) -> Result<String, OfflineError> {
        let mut records = self.read()?;
        let lemma_preview = extract_lemma_preview(raw);
        let now = Utc::now().timestamp_millis();

        if let Some(id) = existing_id {
            if let Some(index) = records.iter().position(|r| r.id == id) {
                let mut record = records.remove(index);
                record.raw_yaml = raw.to_string();
                record.lemma_preview = lemma_preview;
                record.updated_at = now;
                records.insert(0, record);
                self.write(&records)?;
                tracing::debug!(id = %id, "Updated offline record");
                return Ok(id.to_string());
            }
        }

        if records.len() >= self.limit {
            return Err(OfflineError::CapacityExceeded { limit: self.limit });
        }

        let id = Uuid::new_v4().to_string();
        records.insert(
            0,
            OfflineRecord {
                id: id.clone(),
                raw_yaml: raw.to_string(),
                lemma_preview,
                updated_at: now,
            },
        );
        self.write(&records)?;
        tracing::debug!(id = %id, "Created offline record");
        Ok(id)
    }

    /// Save with offline conflict detection.
    ///
    /// Without `force`, a new document whose lemma is already cached, or a
    /// re-save of `id` with different content, is compared against the
    /// stored copy first.
    pub fn save_checked(
        &self,
        raw: &str,
        id: Option<&str>,
        force: bool,
    ) -> Result<LocalSaveOutcome, OfflineError> {
        let doc = WordDocument::parse(raw)?;

        let existing = match id {
            Some(id) => self.get(id)?,
            None => self.find_by_lemma(doc.lemma())?,
        };

        if !force {
            if let Some(existing) = &existing {
                let old_data: Value = serde_yaml::from_str(&existing.raw_yaml).unwrap_or_else(|e| {
                    tracing::warn!(id = %existing.id, error = %e, "Stored offline record is not valid YAML");
                    Value::Null
                });
                let report = conflict::analyze(&old_data, doc.value());

                if report.has_conflict {
                    return Ok(LocalSaveOutcome::Conflict {
                        id: existing.id.clone(),
                        report,
                        old_data,
                        new_data: doc.into_value(),
                    });
                }
                if id.is_none() {
                    return Ok(LocalSaveOutcome::Logged {
                        id: existing.id.clone(),
                    });
                }
            }
        }

        let target = id.or(existing.as_ref().map(|r| r.id.as_str()));
        let saved_id = self.save(raw, target)?;

        if existing.is_some() {
            Ok(LocalSaveOutcome::Updated { id: saved_id })
        } else {
            Ok(LocalSaveOutcome::Saved { id: saved_id })
        }
    }

    /// Removes a record. Missing ids are ignored.
    pub fn delete(&self, id: &str) -> Result<bool, OfflineError> {
        let mut records = self.read()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write(&records)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), OfflineError> {
        self.write(&[])
    }

    fn read(&self) -> Result<Vec<OfflineRecord>, OfflineError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| OfflineError::Io(self.path.clone(), e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(records) => Ok(records),
            Err(e) => {
                // Keep the unreadable file around instead of overwriting it on the next write.
                let backup = self.path.with_extension("json.corrupt");
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "Offline store is corrupt, starting empty"
                );
                fs::rename(&self.path, &backup).map_err(|_| OfflineError::Corrupt(self.path.clone(), e))?;
                Ok(Vec::new())
            }
        }
    }

    fn write(&self, records: &[OfflineRecord]) -> Result<(), OfflineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| OfflineError::Io(parent.to_path_buf(), e))?;
            }
        }

        let bytes = serde_json::to_vec_pretty(records).map_err(OfflineError::Encode)?;

        // Write atomically using temp file + rename
        let temp_path = self.path.with_extension("json.tmp");
        let mut file =
            fs::File::create(&temp_path).map_err(|e| OfflineError::Io(temp_path.clone(), e))?;
        file.write_all(&bytes)
            .map_err(|e| OfflineError::Io(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| OfflineError::Io(temp_path.clone(), e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| OfflineError::Io(self.path.clone(), e))
    }
}
