use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DateKey;

/// Opaque habit identifier, unique within a ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for HabitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HabitId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for HabitId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Habit {
    pub fn new(id: impl Into<HabitId>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            created_at: None,
        }
    }
}

/// Completion flags for one calendar day, keyed by habit id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayRecord(BTreeMap<HabitId, bool>);

pub(crate) static EMPTY_RECORD: DayRecord = DayRecord::new();

impl DayRecord {
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Absent entries read as not completed.
    pub fn is_completed(&self, habit_id: &str) -> bool {
        self.0.get(habit_id).copied().unwrap_or(false)
    }

    pub fn get(&self, habit_id: &str) -> Option<bool> {
        self.0.get(habit_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HabitId, bool)> {
        self.0.iter().map(|(id, done)| (id, *done))
    }

    pub fn completed_ids(&self) -> impl Iterator<Item = &HabitId> {
        self.0.iter().filter(|(_, done)| **done).map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn set(&mut self, habit_id: HabitId, completed: bool) {
        self.0.insert(habit_id, completed);
    }

    pub(crate) fn remove(&mut self, habit_id: &str) -> Option<bool> {
        self.0.remove(habit_id)
    }
}

impl FromIterator<(HabitId, bool)> for DayRecord {
    fn from_iter<I: IntoIterator<Item = (HabitId, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Date-indexed completion records. Days without entries are not stored.
pub type Records = BTreeMap<DateKey, DayRecord>;

/// The habits a fresh ledger starts with.
pub fn default_habits() -> Vec<Habit> {
    vec![
        Habit::new("h1", "💧 Drink 8 glasses of water", "health"),
        Habit::new("h2", "🏃 Exercise for 30 minutes", "fitness"),
        Habit::new("h3", "📚 Read for 20 minutes", "learning"),
        Habit::new("h4", "🧘 Meditate for 10 minutes", "mindfulness"),
        Habit::new("h5", "✍️ Write in journal", "reflection"),
    ]
}
