//! Best-effort mirror of the habit ledger to a per-user remote document.

mod mirror;

pub use mirror::{DirectoryMirror, RemoteMirror};

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use habit_core::clock::Clock;
use habit_core::error::{PersistenceError, SyncError};
use habit_core::habit::{Habit, Records};
use habit_core::settings::Settings;
use habit_core::store::{JsonFileStore, LedgerStore, RemoteState, StoredState};
use habit_core::{Ledger, LedgerChange};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// The mirrored copy of one user's ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub records: Records,
    pub updated_at: DateTime<Utc>,
}

impl RemoteDocument {
    pub fn from_ledger(ledger: &Ledger, updated_at: DateTime<Utc>) -> Self {
        Self {
            habits: ledger.habits().to_vec(),
            records: ledger.records().clone(),
            updated_at,
        }
    }

    pub fn into_remote_state(self) -> RemoteState {
        RemoteState {
            habits: self.habits,
            records: self.records,
            updated_at: self.updated_at,
        }
    }
}

/// Last writer wins: the remote copy is taken only when it is strictly
/// newer than the local stamp, or when nothing local was ever stamped.
pub fn should_adopt(local: Option<DateTime<Utc>>, remote: DateTime<Utc>) -> bool {
    local.map_or(true, |local| remote > local)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub user_id: String,
    pub document: RemoteDocument,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub user_id: String,
    pub pushed: usize,
    pub pending: usize,
}

/// Wraps a local store and mirrors every local change to a remote document.
///
/// Local writes happen first and their errors are returned as usual. The
/// remote push is queued and drained best-effort: a failed push stays at
/// the front of the queue and is retried on the next change or an explicit
/// [`MirroredStore::process_pending`]. Only the newest document is kept.
pub struct MirroredStore<S> {
    local: S,
    mirror: Box<dyn RemoteMirror>,
    clock: Arc<dyn Clock>,
    user_id: String,
    pending_jobs: Mutex<VecDeque<SyncJob>>,
}

impl<S: LedgerStore> MirroredStore<S> {
    pub fn new(
        local: S,
        mirror: Box<dyn RemoteMirror>,
        clock: Arc<dyn Clock>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            local,
            mirror,
            clock,
            user_id: user_id.into(),
            pending_jobs: Mutex::new(VecDeque::new()),
        }
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending_jobs.lock().len()
    }

    fn schedule_push(&self, document: RemoteDocument) {
        let mut jobs = self.pending_jobs.lock();
        jobs.clear();
        jobs.push_back(SyncJob {
            user_id: self.user_id.clone(),
            document,
            attempts: 0,
        });
    }

    /// Pushes queued documents until the queue is empty or a push fails.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub fn process_pending(&self) -> SyncReport {
        let mut jobs = self.pending_jobs.lock();
        let mut pushed = 0;
        while let Some(mut job) = jobs.pop_front() {
            match self.mirror.push(&job.user_id, &job.document) {
                Ok(()) => {
                    pushed += 1;
                    debug!(updated_at = %job.document.updated_at, "pushed ledger to remote mirror");
                }
                Err(err) => {
                    job.attempts += 1;
                    warn!(%err, attempts = job.attempts, "remote push failed, keeping it queued");
                    jobs.push_front(job);
                    break;
                }
            }
        }
        SyncReport {
            user_id: self.user_id.clone(),
            pushed,
            pending: jobs.len(),
        }
    }
}

impl<S: LedgerStore> LedgerStore for MirroredStore<S> {
    fn load_initial(&self) -> Result<StoredState, PersistenceError> {
        self.local.load_initial()
    }

    fn on_ledger_changed(
        &self,
        ledger: &Ledger,
        change: &LedgerChange,
    ) -> Result<(), PersistenceError> {
        self.local.on_ledger_changed(ledger, change)?;
        match change {
            LedgerChange::RemoteAdopted { .. } => {
                // Anything still queued predates the adopted document.
                self.pending_jobs.lock().clear();
                return Ok(());
            }
            LedgerChange::Seeded => return Ok(()),
            _ => {}
        }
        let updated_at = match self.local.last_updated() {
            Ok(Some(stamp)) => stamp,
            _ => self.clock.now_utc(),
        };
        self.schedule_push(RemoteDocument::from_ledger(ledger, updated_at));
        self.process_pending();
        Ok(())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        self.local.save_settings(settings)
    }

    fn last_updated(&self) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        self.local.last_updated()
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.pending_jobs.lock().clear();
        self.local.clear()
    }

    #[instrument(skip(self, _local), fields(user_id = %self.user_id))]
    fn reconcile_remote(&self, _local: &Ledger) -> Result<Option<RemoteState>, SyncError> {
        let Some(remote) = self.mirror.fetch(&self.user_id)? else {
            debug!("no remote document yet");
            return Ok(None);
        };
        let local_stamp = self.local.last_updated().unwrap_or_else(|err| {
            warn!(%err, "unable to read local update stamp");
            None
        });
        if !should_adopt(local_stamp, remote.updated_at) {
            debug!(remote = %remote.updated_at, "local ledger is current");
            return Ok(None);
        }
        info!(remote = %remote.updated_at, "remote ledger is newer");
        Ok(Some(remote.into_remote_state()))
    }
}

/// Opens the on-disk local store and mirrors it into `mirror_root`.
pub fn mirrored_json_store(
    data_dir: &Path,
    mirror_root: &Path,
    user_id: &str,
    clock: Arc<dyn Clock>,
) -> Result<MirroredStore<JsonFileStore>> {
    let local = JsonFileStore::open(data_dir, Arc::clone(&clock))
        .with_context(|| format!("failed to open data directory `{}`", data_dir.display()))?;
    debug!(mirror = %mirror_root.display(), user_id, "mounting directory mirror");
    Ok(MirroredStore::new(
        local,
        Box::new(DirectoryMirror::new(mirror_root)),
        clock,
        user_id,
    ))
}
