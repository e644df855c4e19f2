use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DateKey;
use crate::error::ImportError;
use crate::habit::{Habit, Records};
use crate::ledger::Ledger;
use crate::settings::Settings;

/// Downloadable backup of everything the user owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub records: Records,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<DateTime<Utc>>,
}

impl ExportDocument {
    pub fn capture(ledger: &Ledger, settings: &Settings, exported_at: DateTime<Utc>) -> Self {
        Self {
            habits: ledger.habits().to_vec(),
            records: ledger.records().clone(),
            settings: *settings,
            export_date: Some(exported_at),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, ImportError> {
        let document: Self = serde_json::from_str(raw)?;
        document.validate()?;
        Ok(document)
    }

    pub fn validate(&self) -> Result<(), ImportError> {
        let mut seen = HashSet::new();
        for habit in &self.habits {
            if habit.name.trim().is_empty() {
                return Err(ImportError::EmptyName);
            }
            if !seen.insert(habit.id.as_str()) {
                return Err(ImportError::DuplicateHabit(habit.id.clone()));
            }
        }
        Ok(())
    }

    /// A detached ledger holding the exported habits and records.
    pub fn to_ledger(&self) -> Ledger {
        Ledger::new(self.habits.clone(), self.records.clone())
    }

    pub fn into_parts(self) -> (Vec<Habit>, Records, Settings) {
        (self.habits, self.records, self.settings)
    }
}

pub fn backup_file_name(date: DateKey) -> String {
    format!("habitscope-backup-{date}.json")
}
