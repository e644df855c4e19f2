use std::path::PathBuf;

use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use habit_core::settings::{parse_reminder_time, Theme};
use habit_core::stats::ChartPeriod;
use habit_core::DateKey;

#[derive(Parser, Debug)]
#[command(
    name = "habitscope",
    version,
    about = "habitscope: daily habit tracking with streaks and statistics",
    long_about = None
)]
pub struct Cli {
    /// Defaults to `show` for today.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    #[command(about = "Show the checklist for a day")]
    Show {
        /// Day to show (YYYY-MM-DD), never later than today.
        #[arg(long)]
        date: Option<DateKey>,
    },

    #[command(about = "Toggle a habit's completion")]
    Toggle {
        habit: String,
        #[arg(long)]
        date: Option<DateKey>,
    },

    #[command(about = "Add a habit")]
    Add {
        name: String,
        #[arg(long, default_value = habit_core::session::CUSTOM_CATEGORY)]
        category: String,
    },

    #[command(about = "Delete a habit and its history")]
    Delete { habit: String },

    #[command(about = "Today's completion, weekly average and streaks")]
    Stats,

    #[command(about = "Daily completion over a trailing period")]
    Chart {
        #[arg(default_value_t = ChartPeriod::Week)]
        period: ChartPeriod,
    },

    #[command(about = "A motivational message for the current progress")]
    Feedback,

    #[command(about = "Show or change preferences")]
    Settings {
        #[arg(long)]
        theme: Option<Theme>,
        #[arg(long)]
        notifications: Option<bool>,
        /// Daily reminder time (HH:MM).
        #[arg(long, value_parser = parse_reminder_time)]
        reminder: Option<NaiveTime>,
    },

    #[command(about = "Write a JSON backup")]
    Export {
        /// Defaults to `habitscope-backup-YYYY-MM-DD.json` in the current directory.
        path: Option<PathBuf>,
    },

    #[command(about = "Replace all data with a JSON backup")]
    Import { path: PathBuf },

    #[command(about = "Delete all data and restore the default habits")]
    Reset,

    #[command(about = "Reconcile with the remote mirror and flush pending pushes")]
    Sync,
}

impl Default for Command {
    fn default() -> Self {
        Command::Show { date: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        let cli = Cli::try_parse_from(std::iter::once("habitscope").chain(args.iter().copied()))
            .expect("valid arguments");
        cli.command.unwrap_or_default()
    }

    #[test]
    fn no_subcommand_shows_today() {
        assert_eq!(parse(&[]), Command::Show { date: None });
    }

    #[test]
    fn toggle_accepts_a_date() {
        assert_eq!(
            parse(&["toggle", "h1", "--date", "2025-10-19"]),
            Command::Toggle {
                habit: "h1".into(),
                date: DateKey::from_ymd(2025, 10, 19),
            }
        );
    }

    #[test]
    fn add_defaults_to_custom_category() {
        assert_eq!(
            parse(&["add", "Stretch"]),
            Command::Add {
                name: "Stretch".into(),
                category: "custom".into(),
            }
        );
    }

    #[test]
    fn settings_flags_are_typed() {
        assert_eq!(
            parse(&["settings", "--theme", "dark", "--notifications", "true", "--reminder", "07:30"]),
            Command::Settings {
                theme: Some(Theme::Dark),
                notifications: Some(true),
                reminder: NaiveTime::from_hms_opt(7, 30, 0),
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["habitscope", "chart", "decade"]).is_err());
        assert!(Cli::try_parse_from(["habitscope", "show", "--date", "2025-13-01"]).is_err());
        assert!(Cli::try_parse_from(["habitscope", "settings", "--reminder", "25:00"]).is_err());
    }
}
