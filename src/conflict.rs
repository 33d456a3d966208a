//! Structural comparison of word documents.
//!
//! Two copies of the same lemma are compared after removing the fields that
//! describe the authoring session (`yield.user_word` and
//! `yield.user_context_sentence`). Whatever differs after that is a conflict.
//!
//! Objects are compared by key, so key order never matters. Arrays are compared
//! position by position: reordering elements is a change.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Keys under `yield` that are expected to differ between submissions.
pub const TRANSIENT_YIELD_FIELDS: [&str; 2] = ["user_word", "user_context_sentence"];

/// One step in a path from the document root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Coarse classification of a difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Added,
    Deleted,
    Edited,
    ArrayChanged,
}

/// What changed at a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Change {
    /// Key present only in the new document.
    Added { rhs: Value },
    /// Key present only in the old document.
    Deleted { lhs: Value },
    /// Value replaced (scalar change or type change).
    Edited { lhs: Value, rhs: Value },
    /// Element appended to or removed from the end of an array.
    ArrayChanged { index: usize, item: Box<Change> },
}

impl Change {
    pub fn kind(&self) -> DiffKind {
        match self {
            Change::Added { .. } => DiffKind::Added,
            Change::Deleted { .. } => DiffKind::Deleted,
            Change::Edited { .. } => DiffKind::Edited,
            Change::ArrayChanged { .. } => DiffKind::ArrayChanged,
        }
    }
}

/// A single difference between two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub path: Vec<PathSegment>,
    #[serde(flatten)]
    pub change: Change,
}

impl DiffEntry {
    pub fn kind(&self) -> DiffKind {
        self.change.kind()
    }

    /// Dotted form of the path, e.g. `cognate_family.cognates.0.word`.
    ///
    /// An empty path renders as `root`.
    pub fn path_string(&self) -> String {
        if self.path.is_empty() {
            return "root".to_string();
        }
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Top-level section the difference belongs to (`yield`, `etymology`, ...).
    pub fn section(&self) -> Option<&str> {
        match self.path.first() {
            Some(PathSegment::Key(key)) => Some(key.as_str()),
            _ => None,
        }
    }
}

/// Result of comparing two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub diff: Vec<DiffEntry>,
    pub clean_old: Value,
    pub clean_new: Value,
}

impl ConflictReport {
    /// Dotted paths of every difference, in diff order.
    pub fn paths(&self) -> Vec<String> {
        self.diff.iter().map(DiffEntry::path_string).collect()
    }
}

/// Compares two documents, ignoring the transient authoring fields.
///
/// Neither input is modified. Anything that is not an object (including
/// `null`) is treated as an empty document.
pub fn analyze(old: &Value, new: &Value) -> ConflictReport {
    let clean_old = clean(old);
    let clean_new = clean(new);

    let mut diff = Vec::new();
    let mut path = Vec::new();
    diff_values(&mut path, &clean_old, &clean_new, &mut diff);

    ConflictReport {
        has_conflict: !diff.is_empty(),
        diff,
        clean_old,
        clean_new,
    }
}

/// Returns a copy of `doc` without the transient `yield` fields.
pub fn clean(doc: &Value) -> Value {
    let mut clean = match doc {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    if let Some(Value::Object(section)) = clean.get_mut("yield") {
        for field in TRANSIENT_YIELD_FIELDS {
            section.remove(field);
        }
    }

    Value::Object(clean)
}

fn diff_values(path: &mut Vec<PathSegment>, lhs: &Value, rhs: &Value, out: &mut Vec<DiffEntry>) {
    match (lhs, rhs) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                path.push(PathSegment::Key(key.clone()));
                match right.get(key) {
                    Some(right_value) => diff_values(path, left_value, right_value, out),
                    None => out.push(DiffEntry {
                        path: path.clone(),
                        change: Change::Deleted {
                            lhs: left_value.clone(),
                        },
                    }),
                }
                path.pop();
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    let mut entry_path = path.clone();
                    entry_path.push(PathSegment::Key(key.clone()));
                    out.push(DiffEntry {
                        path: entry_path,
                        change: Change::Added {
                            rhs: right_value.clone(),
                        },
                    });
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            let common = left.len().min(right.len());
            for index in 0..common {
                path.push(PathSegment::Index(index));
                diff_values(path, &left[index], &right[index], out);
                path.pop();
            }
            for (index, removed) in left.iter().enumerate().skip(common) {
                out.push(DiffEntry {
                    path: path.clone(),
                    change: Change::ArrayChanged {
                        index,
                        item: Box::new(Change::Deleted {
                            lhs: removed.clone(),
                        }),
                    },
                });
            }
            for (index, added) in right.iter().enumerate().skip(common) {
                out.push(DiffEntry {
                    path: path.clone(),
                    change: Change::ArrayChanged {
                        index,
                        item: Box::new(Change::Added { rhs: added.clone() }),
                    },
                });
            }
        }
        _ if lhs == rhs => {}
        _ => out.push(DiffEntry {
            path: path.clone(),
            change: Change::Edited {
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            },
        }),
    }
}
