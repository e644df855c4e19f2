use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const REMINDER_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        };
        f.write_str(label)
    }
}

impl FromStr for Theme {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "auto" => Ok(Theme::Auto),
            _ => Err(ParseError::UnknownVariant {
                kind: "theme",
                value: s.to_string(),
            }),
        }
    }
}

/// User preferences, persisted independently of the ledger. Missing fields
/// fall back to their defaults when loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub theme: Theme,
    pub notifications: bool,
    #[serde(with = "hh_mm")]
    pub reminder_time: NaiveTime,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Auto,
            notifications: false,
            reminder_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        }
    }
}

pub fn parse_reminder_time(raw: &str) -> Result<NaiveTime, ParseError> {
    NaiveTime::parse_from_str(raw.trim(), REMINDER_FORMAT)
        .map_err(|_| ParseError::ReminderTime(raw.to_string()))
}

pub fn format_reminder_time(time: NaiveTime) -> String {
    time.format(REMINDER_FORMAT).to_string()
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_reminder_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_reminder_time(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_run() {
        let settings = Settings::default();
        assert_eq!(settings.theme, Theme::Auto);
        assert!(!settings.notifications);
        assert_eq!(format_reminder_time(settings.reminder_time), "09:00");
    }

    #[test]
    fn partial_blob_merges_over_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(format_reminder_time(settings.reminder_time), "09:00");
    }

    #[test]
    fn serializes_reminder_as_hh_mm() {
        let settings = Settings {
            theme: Theme::Light,
            notifications: true,
            reminder_time: parse_reminder_time("07:30").unwrap(),
        };
        let json = serde_json::to_value(settings).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"theme": "light", "notifications": true, "reminderTime": "07:30"})
        );
        assert!(parse_reminder_time("7.30pm").is_err());
        assert!(serde_json::from_str::<Settings>(r#"{"theme":"sepia"}"#).is_err());
    }
}
