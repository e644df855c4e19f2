use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{stamp_for, LedgerStore, StoredState};
use crate::clock::{Clock, SystemClock};
use crate::error::PersistenceError;
use crate::ledger::{Ledger, LedgerChange};
use crate::settings::Settings;

/// In-process store. Writes can be made to fail to exercise degraded paths.
pub struct MemoryStore {
    state: Mutex<StoredState>,
    fail_writes: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_state(StoredState::default(), clock)
    }

    pub fn with_state(state: StoredState, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(state),
            fail_writes: AtomicBool::new(false),
            clock,
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StoredState {
        self.state.lock().clone()
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("memory store is read-only".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl LedgerStore for MemoryStore {
    fn load_initial(&self) -> Result<StoredState, PersistenceError> {
        Ok(self.snapshot())
    }

    fn on_ledger_changed(
        &self,
        ledger: &Ledger,
        change: &LedgerChange,
    ) -> Result<(), PersistenceError> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if change.touches_habits() {
            state.habits = Some(ledger.habits().to_vec());
        }
        if change.touches_records() {
            state.records = Some(ledger.records().clone());
        }
        if let Some(stamp) = stamp_for(change, self.clock.now_utc()) {
            state.updated_at = Some(stamp);
        }
        Ok(())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.state.lock().settings = Some(*settings);
        Ok(())
    }

    fn last_updated(&self) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        Ok(self.state.lock().updated_at)
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.check_writable()?;
        *self.state.lock() = StoredState::default();
        Ok(())
    }
}
