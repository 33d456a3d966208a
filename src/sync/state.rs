use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::conflict::{ConflictReport, DiffEntry};
use crate::db::SaveStatus;

/// How a conflicting item should be settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Write the offline copy over the stored record.
    Overwrite,
    /// Leave both copies as they are.
    #[serde(alias = "keep_old", alias = "keepOld", alias = "keep")]
    Skip,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot {event} an item in state '{from}'")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

/// Lifecycle of one offline item during a sync.
///
/// ```text
/// Unchecked -> Created | Ok | Conflict
/// Conflict  -> Resolved(Overwrite | Skip)
/// Created | Ok | Resolved(Overwrite) -> Synced
/// Created | Ok -> Conflict              (final re-check found a change)
/// any -> Failed
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ItemState {
    #[default]
    Unchecked,
    Created,
    Ok,
    Conflict {
        diff: Vec<DiffEntry>,
    },
    Resolved {
        resolution: Resolution,
    },
    Synced {
        status: SaveStatus,
        #[serde(rename = "wordId")]
        word_id: Uuid,
    },
    Failed {
        reason: String,
    },
}

impl ItemState {
    pub fn name(&self) -> &'static str {
        match self {
            ItemState::Unchecked => "unchecked",
            ItemState::Created => "created",
            ItemState::Ok => "ok",
            ItemState::Conflict { .. } => "conflict",
            ItemState::Resolved { .. } => "resolved",
            ItemState::Synced { .. } => "synced",
            ItemState::Failed { .. } => "failed",
        }
    }

    /// Applies the result of a repository lookup. `None` means no record
    /// exists for the lemma.
    pub fn checked(self, report: Option<&ConflictReport>) -> Result<Self, TransitionError> {
        match self {
            ItemState::Unchecked => Ok(match report {
                None => ItemState::Created,
                Some(report) if report.has_conflict => ItemState::Conflict {
                    diff: report.diff.clone(),
                },
                Some(_) => ItemState::Ok,
            }),
            other => Err(other.invalid("check")),
        }
    }

    pub fn resolve(self, resolution: Resolution) -> Result<Self, TransitionError> {
        match self {
            ItemState::Conflict { .. } => Ok(ItemState::Resolved { resolution }),
            other => Err(other.invalid("resolve")),
        }
    }

    /// The write re-checked the record and found it changed underneath us.
    pub fn conflicted(self, diff: Vec<DiffEntry>) -> Result<Self, TransitionError> {
        match self {
            ItemState::Created | ItemState::Ok => Ok(ItemState::Conflict { diff }),
            other => Err(other.invalid("re-check")),
        }
    }

    pub fn synced(self, status: SaveStatus, word_id: Uuid) -> Result<Self, TransitionError> {
        match self {
            ItemState::Created
            | ItemState::Ok
            | ItemState::Resolved {
                resolution: Resolution::Overwrite,
            } => Ok(ItemState::Synced { status, word_id }),
            other => Err(other.invalid("sync")),
        }
    }

    pub fn fail(self, reason: impl Into<String>) -> Self {
        ItemState::Failed {
            reason: reason.into(),
        }
    }

    /// Whether the item may be written to the repository from this state.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            ItemState::Created
                | ItemState::Ok
                | ItemState::Resolved {
                    resolution: Resolution::Overwrite
                }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ItemState::Conflict { .. })
    }

    fn invalid(&self, event: &'static str) -> TransitionError {
        TransitionError {
            from: self.name(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::analyze;
    use serde_json::json;

    fn report(changed: bool) -> ConflictReport {
        let old = json!({"yield": {"lemma": "run", "part_of_speech": "Verb"}});
        let new = if changed {
            json!({"yield": {"lemma": "run", "part_of_speech": "Noun"}})
        } else {
            old.clone()
        };
        analyze(&old, &new)
    }

    #[test]
    fn test_check_transitions() {
        assert_eq!(ItemState::Unchecked.checked(None).unwrap(), ItemState::Created);
        assert_eq!(
            ItemState::Unchecked.checked(Some(&report(false))).unwrap(),
            ItemState::Ok
        );
        let conflict = ItemState::Unchecked.checked(Some(&report(true))).unwrap();
        assert!(conflict.is_conflict());
        assert!(!conflict.is_writable());
    }

    #[test]
    fn test_check_twice_is_rejected() {
        let err = ItemState::Created.checked(None).unwrap_err();
        assert_eq!(err.from, "created");
        assert_eq!(err.to_string(), "Cannot check an item in state 'created'");
    }

    #[test]
    fn test_resolution_paths() {
        let conflict = ItemState::Unchecked.checked(Some(&report(true))).unwrap();

        let overwrite = conflict.clone().resolve(Resolution::Overwrite).unwrap();
        assert!(overwrite.is_writable());
        let id = Uuid::new_v4();
        assert_eq!(
            overwrite.synced(SaveStatus::Updated, id).unwrap(),
            ItemState::Synced {
                status: SaveStatus::Updated,
                word_id: id
            }
        );

        let skip = conflict.resolve(Resolution::Skip).unwrap();
        assert!(!skip.is_writable());
        assert!(skip.synced(SaveStatus::Updated, id).is_err());
    }

    #[test]
    fn test_unresolved_conflict_cannot_sync() {
        let conflict = ItemState::Unchecked.checked(Some(&report(true))).unwrap();
        assert!(conflict.synced(SaveStatus::Updated, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_only_conflicts_resolve() {
        assert!(ItemState::Ok.resolve(Resolution::Overwrite).is_err());
        assert!(ItemState::Unchecked.resolve(Resolution::Skip).is_err());
    }

    #[test]
    fn test_recheck_conflict() {
        let diff = report(true).diff;
        assert!(ItemState::Ok.conflicted(diff.clone()).unwrap().is_conflict());
        assert!(ItemState::Unchecked.conflicted(diff).is_err());
    }

    #[test]
    fn test_fail_from_any_state() {
        assert_eq!(ItemState::Ok.fail("boom").name(), "failed");
        assert_eq!(ItemState::Unchecked.fail("boom").name(), "failed");
    }

    #[test]
    fn test_resolution_aliases() {
        let keep: Resolution = serde_json::from_str("\"keep_old\"").unwrap();
        assert_eq!(keep, Resolution::Skip);
        let overwrite: Resolution = serde_json::from_str("\"overwrite\"").unwrap();
        assert_eq!(overwrite, Resolution::Overwrite);
    }

    #[test]
    fn test_state_serialization() {
        let id = Uuid::nil();
        let json = serde_json::to_value(ItemState::Synced {
            status: SaveStatus::Created,
            word_id: id,
        })
        .unwrap();
        assert_eq!(json["state"], "synced");
        assert_eq!(json["status"], "created");
        assert_eq!(json["wordId"], id.to_string());
    }
}
