//! Persistence seam. The engine never knows the storage medium: the session
//! hands every ledger change to a [`LedgerStore`] and logs, rather than
//! propagates, whatever goes wrong there.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::error::{PersistenceError, SyncError};
use crate::habit::{Habit, Records};
use crate::ledger::{Ledger, LedgerChange};
use crate::settings::Settings;

pub const HABITS_KEY: &str = "habits";
pub const RECORDS_KEY: &str = "records";
pub const SETTINGS_KEY: &str = "settings";
pub const LAST_UPDATE_KEY: &str = "last_update";

/// Independently persisted blobs; `None` means the blob was never written
/// or could not be read. Keys of blobs that exist but could not be read are
/// listed in `unreadable`, and those blobs are left as they are on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredState {
    pub habits: Option<Vec<Habit>>,
    pub records: Option<Records>,
    pub settings: Option<Settings>,
    pub updated_at: Option<DateTime<Utc>>,
    pub unreadable: Vec<&'static str>,
}

impl StoredState {
    /// True when the habits or records blob exists but could not be read.
    /// Writing the ledger back would then replace data nobody has seen.
    pub fn ledger_unreadable(&self) -> bool {
        self.unreadable
            .iter()
            .any(|key| *key == HABITS_KEY || *key == RECORDS_KEY)
    }
}

/// Ledger contents taken over from a newer remote mirror document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteState {
    pub habits: Vec<Habit>,
    pub records: Records,
    pub updated_at: DateTime<Utc>,
}

pub trait LedgerStore: Send + Sync {
    /// Reads every blob on its own, so one bad blob never hides the others.
    /// An `Err` means the store as a whole could not be read.
    fn load_initial(&self) -> Result<StoredState, PersistenceError>;

    /// Called after every successful ledger mutation.
    fn on_ledger_changed(&self, ledger: &Ledger, change: &LedgerChange)
        -> Result<(), PersistenceError>;

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError>;

    /// Timestamp of the last local write, or of the last adopted remote document.
    fn last_updated(&self) -> Result<Option<DateTime<Utc>>, PersistenceError>;

    /// Wipes every persisted blob.
    fn clear(&self) -> Result<(), PersistenceError>;

    /// Returns remote contents the session should adopt, if any are newer.
    fn reconcile_remote(&self, _local: &Ledger) -> Result<Option<RemoteState>, SyncError> {
        Ok(None)
    }
}

/// Stamp to record for a change: remote adoptions keep the remote time,
/// seeding defaults records nothing so a newer remote still wins.
pub(crate) fn stamp_for(change: &LedgerChange, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match change {
        LedgerChange::RemoteAdopted { updated_at } => Some(*updated_at),
        LedgerChange::Seeded => None,
        _ => Some(now),
    }
}
