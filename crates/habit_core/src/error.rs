use std::path::PathBuf;

use thiserror::Error;

use crate::habit::HabitId;

/// Failures of local ledger operations. These are returned synchronously so
/// the caller can reject the action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("habit name must not be empty")]
    EmptyName,
    #[error("habit `{0}` does not exist")]
    NotFound(HabitId),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored `{key}` blob is not valid")]
    Malformed {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode `{key}` blob")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote mirror unreachable: {0}")]
    Unreachable(String),
    #[error("remote document is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("export document is not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("export document lists habit `{0}` more than once")]
    DuplicateHabit(HabitId),
    #[error("export document contains a habit with an empty name")]
    EmptyName,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    DateKey(String),
    #[error("invalid time `{0}`, expected HH:MM")]
    ReminderTime(String),
    #[error("unknown {kind} `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
}
