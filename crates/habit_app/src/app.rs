use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use habit_core::calendar::DateKey;
use habit_core::clock::{Clock, SystemClock};
use habit_core::export::{backup_file_name, ExportDocument};
use habit_core::settings::format_reminder_time;
use habit_core::stats::{ChartPeriod, ChartPoint};
use habit_core::store::{JsonFileStore, LedgerStore};
use habit_core::HabitSession;
use habit_sync::{mirrored_json_store, MirroredStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::cli::Command;

const DEFAULT_USER_ID: &str = "local-user";
const BAR_WIDTH: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) mirror_dir: Option<PathBuf>,
    pub(crate) user_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("HABITSCOPE_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("HABITSCOPE_MIRROR_DIR") {
            if !dir.trim().is_empty() {
                config.mirror_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(user) = std::env::var("HABITSCOPE_USER_ID") {
            let user = user.trim();
            if user.is_empty() {
                bail!("HABITSCOPE_USER_ID is set but empty");
            }
            config.user_id = user.to_string();
        }
        Ok(config)
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn mirror_dir(&self) -> Option<&PathBuf> {
        self.mirror_dir.as_ref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("habitscope");
        Self {
            data_dir,
            mirror_dir: None,
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

/// A session plus the pieces the terminal commands need around it.
pub struct App {
    session: HabitSession,
    mirror: Option<Arc<MirroredStore<JsonFileStore>>>,
    rng: StdRng,
}

impl App {
    /// Opens the on-disk store (mirrored when configured) and reconciles
    /// with the remote before the first command runs.
    pub fn open(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let (store, mirror): (Arc<dyn LedgerStore>, _) = match &config.mirror_dir {
            Some(root) => {
                let mirrored = Arc::new(mirrored_json_store(
                    &config.data_dir,
                    root,
                    &config.user_id,
                    Arc::clone(&clock),
                )?);
                (mirrored.clone() as Arc<dyn LedgerStore>, Some(mirrored))
            }
            None => {
                let local = JsonFileStore::open(&config.data_dir, Arc::clone(&clock))
                    .with_context(|| {
                        format!("failed to open data directory `{}`", config.data_dir.display())
                    })?;
                (Arc::new(local) as Arc<dyn LedgerStore>, None)
            }
        };
        info!(data_dir = %config.data_dir.display(), mirrored = mirror.is_some(), "opening habit store");

        let mut session = HabitSession::builder()
            .with_store(store)
            .with_clock(clock)
            .build();
        if mirror.is_some() {
            session.reconcile_remote();
        }
        Ok(Self {
            session,
            mirror,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn from_session(session: HabitSession, rng: StdRng) -> Self {
        Self {
            session,
            mirror: None,
            rng,
        }
    }

    pub fn session(&self) -> &HabitSession {
        &self.session
    }

    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<()> {
        debug!(?command, "executing command");
        match command {
            Command::Show { date } => {
                self.select(date)?;
                self.render_day(out)?;
            }
            Command::Toggle { habit, date } => {
                self.select(date)?;
                let done = self.session.toggle_habit(&habit)?;
                let name = self.habit_name(&habit);
                let day = self.session.selected_date();
                if done {
                    writeln!(out, "Marked {name} done for {day}")?;
                } else {
                    writeln!(out, "Cleared {name} for {day}")?;
                }
            }
            Command::Add { name, category } => {
                let habit = self.session.add_habit_in(&name, &category)?;
                writeln!(out, "Added {} ({})", habit.name, habit.id)?;
            }
            Command::Delete { habit } => {
                let removed = self.session.delete_habit(&habit)?;
                writeln!(out, "Deleted {} ({})", removed.name, removed.id)?;
            }
            Command::Stats => self.render_stats(out)?,
            Command::Chart { period } => self.render_chart(period, out)?,
            Command::Feedback => {
                let message = self.session.feedback(&mut self.rng);
                writeln!(out, "{}", message.text)?;
            }
            Command::Settings {
                theme,
                notifications,
                reminder,
            } => {
                if theme.is_some() || notifications.is_some() || reminder.is_some() {
                    self.session.update_settings(|settings| {
                        if let Some(theme) = theme {
                            settings.theme = theme;
                        }
                        if let Some(enabled) = notifications {
                            settings.notifications = enabled;
                        }
                        if let Some(time) = reminder {
                            settings.reminder_time = time;
                        }
                    });
                }
                let settings = self.session.settings();
                writeln!(out, "theme:         {}", settings.theme)?;
                writeln!(
                    out,
                    "notifications: {}",
                    if settings.notifications { "on" } else { "off" }
                )?;
                writeln!(out, "reminder:      {}", format_reminder_time(settings.reminder_time))?;
            }
            Command::Export { path } => {
                let path =
                    path.unwrap_or_else(|| PathBuf::from(backup_file_name(self.session.today())));
                let document = self.session.export();
                let payload = document
                    .to_json_pretty()
                    .context("failed to encode backup")?;
                fs::write(&path, payload)
                    .with_context(|| format!("failed to write `{}`", path.display()))?;
                writeln!(
                    out,
                    "Exported {} habits and {} recorded days to {}",
                    document.habits.len(),
                    document.records.len(),
                    path.display()
                )?;
            }
            Command::Import { path } => {
                let raw = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read `{}`", path.display()))?;
                let document = ExportDocument::from_json(&raw)
                    .with_context(|| format!("`{}` is not a valid backup", path.display()))?;
                let (habits, days) = (document.habits.len(), document.records.len());
                self.session.import(document)?;
                writeln!(out, "Imported {habits} habits and {days} recorded days")?;
            }
            Command::Reset => {
                self.session.reset();
                writeln!(out, "Reset to the default habits")?;
            }
            Command::Sync => self.sync(out)?,
        }
        Ok(())
    }

    fn select(&mut self, date: Option<DateKey>) -> Result<()> {
        let Some(date) = date else {
            self.session.go_to_today();
            return Ok(());
        };
        if !self.session.select_date(date) {
            bail!("{date} is in the future, today is {}", self.session.today());
        }
        Ok(())
    }

    fn habit_name(&self, habit_id: &str) -> String {
        self.session
            .ledger()
            .habit(habit_id)
            .map(|habit| habit.name.clone())
            .unwrap_or_else(|| habit_id.to_string())
    }

    fn render_day(&self, out: &mut impl Write) -> Result<()> {
        let ledger = self.session.ledger();
        let day = self.session.selected_date();
        writeln!(out, "{}", format_day_heading(day, self.session.today()))?;
        for habit in ledger.habits() {
            let mark = if ledger.is_completed(habit.id.as_str(), day) {
                'x'
            } else {
                ' '
            };
            let streak = self.session.habit_streak(habit.id.as_str());
            write!(out, "  [{mark}] {:<16} {}", habit.id.as_str(), habit.name)?;
            if streak > 0 {
                write!(out, "  ({streak} day streak)")?;
            }
            writeln!(out)?;
        }
        writeln!(
            out,
            "{}/{} done ({}%)",
            ledger.completed_count(day),
            ledger.habit_count(),
            ledger.completion_percent(day)
        )?;
        Ok(())
    }

    fn render_stats(&self, out: &mut impl Write) -> Result<()> {
        let snapshot = self.session.snapshot();
        let all_time = self.session.all_time();
        writeln!(out, "Today:          {}%", snapshot.today_completion_pct)?;
        writeln!(out, "Weekly average: {}%", snapshot.weekly_avg_pct)?;
        writeln!(out, "Current streak: {}", plural_days(snapshot.current_streak))?;
        writeln!(out, "Best streak:    {}", plural_days(all_time.best_streak))?;
        writeln!(out, "Habits:         {}", snapshot.total_habits)?;
        writeln!(
            out,
            "All time:       {} completions over {}, {}% average",
            all_time.total_completed,
            plural_days(all_time.days_tracked as u32),
            all_time.average_completion
        )?;
        Ok(())
    }

    fn render_chart(&self, period: ChartPeriod, out: &mut impl Write) -> Result<()> {
        writeln!(out, "Completion, last {} days", period.days())?;
        for point in self.session.chart(period) {
            writeln!(out, "{}", format_chart_row(&point))?;
        }
        Ok(())
    }

    fn sync(&mut self, out: &mut impl Write) -> Result<()> {
        let Some(mirror) = self.mirror.clone() else {
            writeln!(out, "No remote mirror configured (set HABITSCOPE_MIRROR_DIR)")?;
            return Ok(());
        };
        let report = mirror.process_pending();
        if self.session.reconcile_remote() {
            writeln!(out, "Adopted newer data from the remote mirror")?;
        } else {
            writeln!(out, "Local data is up to date")?;
        }
        if report.pending > 0 {
            writeln!(out, "{} change(s) still waiting to be pushed", report.pending)?;
        } else if report.pushed > 0 {
            writeln!(out, "Pushed {} pending change(s)", report.pushed)?;
        }
        Ok(())
    }
}

pub fn run(config: AppConfig, command: Command) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut app = App::open(&config, clock).context("failed to open habit data")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    app.execute(command, &mut out)
}

fn format_day_heading(date: DateKey, today: DateKey) -> String {
    let calendar = date.date().format("%A, %B %d, %Y");
    format!("{calendar} ({})", format_relative_label(date, today))
}

fn format_relative_label(date: DateKey, today: DateKey) -> String {
    match today.days_since(date) {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        d if d < 0 => format!("In {} days", -d),
        d => format!("{d} days ago"),
    }
}

fn format_chart_row(point: &ChartPoint) -> String {
    let filled = usize::from(point.percent) * BAR_WIDTH / 100;
    let bar: String = std::iter::repeat('#')
        .take(filled)
        .chain(std::iter::repeat('.').take(BAR_WIDTH - filled))
        .collect();
    format!("{}  {bar} {:>3}%", point.date, point.percent)
}

fn plural_days(count: u32) -> String {
    if count == 1 {
        "1 day".to_string()
    } else {
        format!("{count} days")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use habit_core::clock::FixedClock;
    use habit_core::store::MemoryStore;

    fn app_at(now: &str) -> (App, Arc<MemoryStore>) {
        let clock = Arc::new(FixedClock::new(DateTime::parse_from_rfc3339(now).unwrap()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let session = HabitSession::builder()
            .with_store(store.clone())
            .with_clock(clock)
            .build();
        (App::from_session(session, StdRng::seed_from_u64(7)), store)
    }

    fn run_to_string(app: &mut App, command: Command) -> String {
        let mut out = Vec::new();
        app.execute(command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn relative_labels() {
        let today = DateKey::from_ymd(2025, 10, 20).unwrap();
        assert_eq!(format_relative_label(today, today), "Today");
        assert_eq!(format_relative_label(today.offset(-1), today), "Yesterday");
        assert_eq!(format_relative_label(today.offset(-4), today), "4 days ago");
        assert_eq!(format_relative_label(today.offset(2), today), "In 2 days");
    }

    #[test]
    fn chart_rows_scale_to_bar_width() {
        let point = ChartPoint {
            date: DateKey::from_ymd(2025, 10, 20).unwrap(),
            percent: 40,
        };
        assert_eq!(format_chart_row(&point), "2025-10-20  ########............  40%");
    }

    #[test]
    fn show_lists_defaults_for_today() {
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        let output = run_to_string(&mut app, Command::default());
        assert!(output.starts_with("Monday, October 20, 2025 (Today)"));
        assert_eq!(output.matches("[ ]").count(), 5);
        assert!(output.ends_with("0/5 done (0%)\n"));
    }

    #[test]
    fn toggle_on_a_past_day_and_show_it() {
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        let yesterday = DateKey::from_ymd(2025, 10, 19);
        let output = run_to_string(
            &mut app,
            Command::Toggle {
                habit: "h1".into(),
                date: yesterday,
            },
        );
        assert!(output.starts_with("Marked"));
        assert!(output.trim_end().ends_with("done for 2025-10-19"));

        let shown = run_to_string(&mut app, Command::Show { date: yesterday });
        assert!(shown.contains("(Yesterday)"));
        assert!(shown.contains("1/5 done (20%)"));
    }

    #[test]
    fn future_dates_are_rejected() {
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        let err = app
            .execute(
                Command::Show {
                    date: DateKey::from_ymd(2025, 10, 21),
                },
                &mut Vec::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("in the future"));
    }

    #[test]
    fn unknown_habit_is_an_error() {
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        let result = app.execute(
            Command::Delete {
                habit: "nope".into(),
            },
            &mut Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn stats_reflect_todays_progress() {
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        for habit in ["h1", "h2"] {
            run_to_string(
                &mut app,
                Command::Toggle {
                    habit: habit.into(),
                    date: None,
                },
            );
        }
        let output = run_to_string(&mut app, Command::Stats);
        assert!(output.contains("Today:          40%"));
        assert!(output.contains("Weekly average: 6%"));
        assert!(output.contains("Current streak: 0 days"));
        assert!(output.contains("Habits:         5"));
    }

    #[test]
    fn settings_are_updated_and_persisted() {
        let (mut app, store) = app_at("2025-10-20T09:00:00+02:00");
        let output = run_to_string(
            &mut app,
            Command::Settings {
                theme: Some(habit_core::settings::Theme::Dark),
                notifications: Some(true),
                reminder: chrono::NaiveTime::from_hms_opt(7, 30, 0),
            },
        );
        assert!(output.contains("theme:         dark"));
        assert!(output.contains("notifications: on"));
        assert!(output.contains("reminder:      07:30"));
        let saved = store.snapshot().settings.unwrap();
        assert_eq!(saved.theme, habit_core::settings::Theme::Dark);
    }

    #[test]
    fn export_then_import_restores_data() {
        let temp = tempfile::tempdir().unwrap();
        let backup = temp.path().join("backup.json");
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        run_to_string(
            &mut app,
            Command::Add {
                name: "Stretch".into(),
                category: "custom".into(),
            },
        );
        let exported = run_to_string(
            &mut app,
            Command::Export {
                path: Some(backup.clone()),
            },
        );
        assert!(exported.starts_with("Exported 6 habits"));

        run_to_string(&mut app, Command::Reset);
        assert_eq!(app.session().ledger().habit_count(), 5);

        let imported = run_to_string(&mut app, Command::Import { path: backup });
        assert_eq!(imported, "Imported 6 habits and 0 recorded days\n");
        assert_eq!(app.session().ledger().habit_count(), 6);
    }

    #[test]
    fn import_rejects_garbage_and_keeps_data() {
        let temp = tempfile::tempdir().unwrap();
        let backup = temp.path().join("broken.json");
        fs::write(&backup, "{\"records\": {}}").unwrap();
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        assert!(app
            .execute(Command::Import { path: backup }, &mut Vec::new())
            .is_err());
        assert_eq!(app.session().ledger().habit_count(), 5);
    }

    #[test]
    fn late_evening_feedback_is_generic() {
        let (mut app, _) = app_at("2025-10-20T21:00:00+02:00");
        let output = run_to_string(&mut app, Command::Feedback);
        let expected: Vec<String> = habit_core::feedback::FeedbackCategory::Generic
            .templates()
            .iter()
            .map(|template| template.replace("{streak}", "0").replace("{weekly}", "0").replace("{today}", "0"))
            .collect();
        assert!(expected.contains(&output.trim_end().to_string()));
    }

    #[test]
    fn sync_without_mirror_explains_how_to_enable_it() {
        let (mut app, _) = app_at("2025-10-20T09:00:00+02:00");
        let output = run_to_string(&mut app, Command::Sync);
        assert!(output.contains("HABITSCOPE_MIRROR_DIR"));
    }

    #[test]
    fn default_config_is_local_only() {
        let config = AppConfig::default();
        assert!(config.mirror_dir().is_none());
        assert_eq!(config.user_id(), "local-user");
        assert!(config.data_dir().ends_with("habitscope"));
    }
}
