//! The authoritative in-memory store of habits and their daily completions.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::calendar::DateKey;
use crate::error::LedgerError;
use crate::habit::{default_habits, DayRecord, Habit, HabitId, Records, EMPTY_RECORD};

/// Describes a successful mutation, handed to every change listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    HabitAdded(HabitId),
    HabitDeleted(HabitId),
    CompletionSet {
        habit: HabitId,
        date: DateKey,
        completed: bool,
    },
    /// Defaults installed on first run.
    Seeded,
    /// Contents replaced wholesale by an import or a reset.
    Replaced,
    /// Contents replaced by a newer remote mirror document.
    RemoteAdopted { updated_at: DateTime<Utc> },
}

impl LedgerChange {
    pub fn touches_habits(&self) -> bool {
        !matches!(self, LedgerChange::CompletionSet { .. })
    }

    pub fn touches_records(&self) -> bool {
        !matches!(self, LedgerChange::HabitAdded(_))
    }
}

pub type ChangeListener = Arc<dyn Fn(&Ledger, &LedgerChange) + Send + Sync>;

/// Habits in display order plus the date-indexed completion records.
///
/// Every successful mutation notifies the registered listeners after the
/// in-memory state is fully updated; failed operations leave the ledger
/// untouched and notify nobody.
#[derive(Default)]
pub struct Ledger {
    habits: Vec<Habit>,
    records: Records,
    listeners: Vec<ChangeListener>,
}

impl Ledger {
    pub fn new(habits: Vec<Habit>, records: Records) -> Self {
        Self {
            habits,
            records: prune_empty(records),
            listeners: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_habits(), Records::new())
    }

    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn records(&self) -> &Records {
        &self.records
    }

    pub fn habit(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id.as_str() == habit_id)
    }

    pub fn contains_habit(&self, habit_id: &str) -> bool {
        self.habit(habit_id).is_some()
    }

    pub fn habit_count(&self) -> usize {
        self.habits.len()
    }

    /// Registers a callback invoked after every successful mutation.
    pub fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    pub fn add_habit(&mut self, name: &str, category: &str) -> Result<Habit, LedgerError> {
        self.add_habit_at(name, category, Utc::now())
    }

    pub fn add_habit_at(
        &mut self,
        name: &str,
        category: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Habit, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::EmptyName);
        }
        let habit = Habit {
            id: self.next_habit_id(created_at),
            name: name.to_string(),
            category: category.trim().to_string(),
            created_at: Some(created_at),
        };
        self.habits.push(habit.clone());
        debug!(habit_id = %habit.id, "habit added");
        self.notify(LedgerChange::HabitAdded(habit.id.clone()));
        Ok(habit)
    }

    /// Removes the habit and its entry from every stored day.
    pub fn delete_habit(&mut self, habit_id: &str) -> Result<Habit, LedgerError> {
        let index = self
            .habits
            .iter()
            .position(|habit| habit.id.as_str() == habit_id)
            .ok_or_else(|| LedgerError::NotFound(HabitId::from(habit_id)))?;
        let removed = self.habits.remove(index);
        self.records.retain(|_, record| {
            record.remove(habit_id);
            !record.is_empty()
        });
        debug!(habit_id = %removed.id, "habit deleted");
        self.notify(LedgerChange::HabitDeleted(removed.id.clone()));
        Ok(removed)
    }

    pub fn set_completion(
        &mut self,
        habit_id: &str,
        date: DateKey,
        completed: bool,
    ) -> Result<(), LedgerError> {
        let Some(habit) = self.habit(habit_id) else {
            return Err(LedgerError::NotFound(HabitId::from(habit_id)));
        };
        let habit = habit.id.clone();
        self.records
            .entry(date)
            .or_default()
            .set(habit.clone(), completed);
        self.notify(LedgerChange::CompletionSet {
            habit,
            date,
            completed,
        });
        Ok(())
    }

    /// Flips the flag for `(habit, date)` and returns the new value.
    pub fn toggle_completion(&mut self, habit_id: &str, date: DateKey) -> Result<bool, LedgerError> {
        let completed = !self.is_completed(habit_id, date);
        self.set_completion(habit_id, date, completed)?;
        Ok(completed)
    }

    pub fn is_completed(&self, habit_id: &str, date: DateKey) -> bool {
        self.completion_for(date).is_completed(habit_id)
    }

    /// The stored record, or an empty one when nothing was recorded that day.
    pub fn completion_for(&self, date: DateKey) -> &DayRecord {
        self.records.get(&date).unwrap_or(&EMPTY_RECORD)
    }

    /// Completed entries that reference a currently defined habit.
    pub fn completed_count(&self, date: DateKey) -> usize {
        self.completion_for(date)
            .completed_ids()
            .filter(|id| self.contains_habit(id.as_str()))
            .count()
    }

    pub fn completion_percent(&self, date: DateKey) -> u8 {
        percent(self.completed_count(date), self.habit_count())
    }

    /// Every current habit completed, and there is at least one habit.
    pub fn is_perfect_day(&self, date: DateKey) -> bool {
        !self.habits.is_empty() && self.completed_count(date) == self.habit_count()
    }

    pub fn replace(&mut self, habits: Vec<Habit>, records: Records) {
        self.habits = habits;
        self.records = prune_empty(records);
        self.notify(LedgerChange::Replaced);
    }

    pub fn adopt_remote(&mut self, habits: Vec<Habit>, records: Records, updated_at: DateTime<Utc>) {
        self.habits = habits;
        self.records = prune_empty(records);
        self.notify(LedgerChange::RemoteAdopted { updated_at });
    }

    fn next_habit_id(&self, created_at: DateTime<Utc>) -> HabitId {
        let base = format!("h{}", created_at.timestamp_millis());
        if !self.contains_habit(&base) {
            return HabitId::new(base);
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{base}-{suffix}");
            if !self.contains_habit(&candidate) {
                return HabitId::new(candidate);
            }
            suffix += 1;
        }
    }

    fn notify(&self, change: LedgerChange) {
        for listener in &self.listeners {
            listener(self, &change);
        }
    }
}

/// A clone copies contents only; it starts with no listeners, so mutating
/// it never reaches the original's store.
impl Clone for Ledger {
    fn clone(&self) -> Self {
        Self {
            habits: self.habits.clone(),
            records: self.records.clone(),
            listeners: Vec::new(),
        }
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("habits", &self.habits)
            .field("records", &self.records)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Equality covers contents only, never the registered listeners.
impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.habits == other.habits && self.records == other.records
    }
}

impl Eq for Ledger {}

/// `round(100 * part / whole)` with halves rounded up, and 0 when `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (part as u64, whole as u64);
    let rounded = (200 * part + whole) / (2 * whole);
    rounded.min(100) as u8
}

fn prune_empty(mut records: Records) -> Records {
    records.retain(|_, record| !record.is_empty());
    records
}
