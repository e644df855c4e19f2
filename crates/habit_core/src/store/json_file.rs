use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{
    stamp_for, LedgerStore, StoredState, HABITS_KEY, LAST_UPDATE_KEY, RECORDS_KEY, SETTINGS_KEY,
};
use crate::clock::Clock;
use crate::error::PersistenceError;
use crate::ledger::{Ledger, LedgerChange};
use crate::settings::Settings;

/// Keeps each blob as `<dir>/<key>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonFileStore {
    pub fn open(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| PersistenceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, clock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read_blob<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, PersistenceError> {
        let path = self.blob_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| PersistenceError::Malformed { key, source })
    }

    fn load_blob<T: DeserializeOwned>(
        &self,
        key: &'static str,
        unreadable: &mut Vec<&'static str>,
    ) -> Option<T> {
        match self.read_blob(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, key, "leaving unreadable blob in place");
                unreadable.push(key);
                None
            }
        }
    }

    /// Writes through a sibling temp file so a crash never leaves half a blob.
    fn write_blob<T: Serialize + ?Sized>(&self, key: &'static str, value: &T) -> Result<(), PersistenceError> {
        let payload = serde_json::to_string_pretty(value)
            .map_err(|source| PersistenceError::Encode { key, source })?;
        let path = self.blob_path(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload).map_err(|source| PersistenceError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(key, path = %path.display(), "blob written");
        Ok(())
    }

    fn remove_blob(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.blob_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(PersistenceError::Io { path, source }),
        }
    }
}

impl LedgerStore for JsonFileStore {
    fn load_initial(&self) -> Result<StoredState, PersistenceError> {
        let mut unreadable = Vec::new();
        let habits = self.load_blob(HABITS_KEY, &mut unreadable);
        let records = self.load_blob(RECORDS_KEY, &mut unreadable);
        let settings = self.load_blob(SETTINGS_KEY, &mut unreadable);
        let updated_at = self.load_blob(LAST_UPDATE_KEY, &mut unreadable);
        Ok(StoredState {
            habits,
            records,
            settings,
            updated_at,
            unreadable,
        })
    }

    fn on_ledger_changed(
        &self,
        ledger: &Ledger,
        change: &LedgerChange,
    ) -> Result<(), PersistenceError> {
        if change.touches_habits() {
            self.write_blob(HABITS_KEY, ledger.habits())?;
        }
        if change.touches_records() {
            self.write_blob(RECORDS_KEY, ledger.records())?;
        }
        if let Some(stamp) = stamp_for(change, self.clock.now_utc()) {
            self.write_blob(LAST_UPDATE_KEY, &stamp)?;
        }
        Ok(())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        self.write_blob(SETTINGS_KEY, settings)
    }

    fn last_updated(&self) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        self.read_blob(LAST_UPDATE_KEY)
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        for key in [HABITS_KEY, RECORDS_KEY, SETTINGS_KEY, LAST_UPDATE_KEY] {
            self.remove_blob(key)?;
        }
        Ok(())
    }
}
