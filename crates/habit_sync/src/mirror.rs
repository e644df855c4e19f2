use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use habit_core::error::SyncError;
use tracing::debug;

use crate::RemoteDocument;

/// A per-user document store the ledger is mirrored to.
pub trait RemoteMirror: Send + Sync {
    fn fetch(&self, user_id: &str) -> Result<Option<RemoteDocument>, SyncError>;
    fn push(&self, user_id: &str, document: &RemoteDocument) -> Result<(), SyncError>;
}

/// Keeps one JSON document per user under `<root>/users/`. The root must
/// already exist; a missing root reads as an unreachable remote.
#[derive(Debug, Clone)]
pub struct DirectoryMirror {
    root: PathBuf,
}

impl DirectoryMirror {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn document_path(&self, user_id: &str) -> Result<PathBuf, SyncError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SyncError::Malformed(format!("invalid user id `{user_id}`")));
        }
        if !self.root.is_dir() {
            return Err(SyncError::Unreachable(format!(
                "mirror root `{}` is not available",
                self.root.display()
            )));
        }
        Ok(self.root.join("users").join(format!("{user_id}.json")))
    }
}

impl RemoteMirror for DirectoryMirror {
    fn fetch(&self, user_id: &str) -> Result<Option<RemoteDocument>, SyncError> {
        let path = self.document_path(user_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(SyncError::Unreachable(format!("{}: {err}", path.display())));
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| SyncError::Malformed(format!("{}: {err}", path.display())))
    }

    fn push(&self, user_id: &str, document: &RemoteDocument) -> Result<(), SyncError> {
        let path = self.document_path(user_id)?;
        let payload = serde_json::to_string_pretty(document)
            .map_err(|err| SyncError::Malformed(err.to_string()))?;
        let unreachable = |err: std::io::Error| SyncError::Unreachable(format!("{}: {err}", path.display()));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(unreachable)?;
        }
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(unreachable)?;
        fs::rename(&staging, &path).map_err(unreachable)?;
        debug!(user_id, path = %path.display(), "remote document written");
        Ok(())
    }
}
