use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use parking_lot::Mutex;

use crate::calendar::{date_key, DateKey};

/// Source of "now" for the session and the stores, so tests can pin the date.
pub trait Clock: Send + Sync {
    /// Current instant in the user's local offset.
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> DateKey {
        date_key(&self.now())
    }

    fn hour(&self) -> u32 {
        self.now().hour()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.lock();
        *guard = *guard + delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}
