use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::calendar::DateKey;
use crate::clock::{Clock, SystemClock};
use crate::error::{ImportError, LedgerError};
use crate::export::ExportDocument;
use crate::feedback::{feedback_message, FeedbackMessage};
use crate::habit::{default_habits, Habit, Records};
use crate::ledger::{ChangeListener, Ledger, LedgerChange};
use crate::settings::Settings;
use crate::stats::{chart_series, AllTimeStats, ChartPeriod, ChartPoint, StatsSnapshot};
use crate::store::{LedgerStore, MemoryStore, StoredState};
use crate::streak::habit_streak;

/// Category given to habits added by the user.
pub const CUSTOM_CATEGORY: &str = "custom";

/// One user's working context: the ledger, settings, and the day being viewed.
///
/// The store is attached to the ledger as its first change listener, so
/// every mutation is flushed after it lands in memory. Store failures are
/// logged and never undo or block the in-memory change.
///
/// When the saved habits or records cannot be read, the store is not
/// attached at all: the session works on defaults in memory and the saved
/// blobs stay exactly as they were.
pub struct HabitSession {
    ledger: Ledger,
    settings: Settings,
    store: Arc<dyn LedgerStore>,
    persisting: bool,
    clock: Arc<dyn Clock>,
    today: DateKey,
    selected: DateKey,
}

pub struct HabitSessionBuilder {
    store: Option<Arc<dyn LedgerStore>>,
    clock: Arc<dyn Clock>,
}

impl HabitSessionBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Loads persisted state, falling back to defaults for anything absent.
    pub fn build(self) -> HabitSession {
        let clock = self.clock;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new(Arc::clone(&clock))) as Arc<dyn LedgerStore>);

        let (state, loaded) = match store.load_initial() {
            Ok(state) => (state, true),
            Err(err) => {
                warn!(%err, "failed to load persisted state, starting from defaults");
                (StoredState::default(), false)
            }
        };

        let persisting = loaded && !state.ledger_unreadable();
        if loaded && !persisting {
            warn!(
                unreadable = ?state.unreadable,
                "saved ledger is unreadable, changes in this session will not be saved"
            );
        }
        let seed_defaults = persisting && state.habits.is_none();
        let habits = state.habits.unwrap_or_else(default_habits);
        let records = state.records.unwrap_or_default();
        let settings = state.settings.unwrap_or_default();

        let mut ledger = Ledger::new(habits, records);
        if seed_defaults {
            info!("no saved habits, installing defaults");
            persist(store.as_ref(), &ledger, &LedgerChange::Seeded);
        }
        if persisting {
            ledger.subscribe(store_listener(Arc::clone(&store)));
        }

        let today = clock.today();
        info!(
            habit_count = ledger.habit_count(),
            recorded_days = ledger.records().len(),
            %today,
            "session ready"
        );
        HabitSession {
            ledger,
            settings,
            store,
            persisting,
            clock,
            today,
            selected: today,
        }
    }
}

impl Default for HabitSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitSession {
    pub fn builder() -> HabitSessionBuilder {
        HabitSessionBuilder::new()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn today(&self) -> DateKey {
        self.today
    }

    pub fn selected_date(&self) -> DateKey {
        self.selected
    }

    pub fn is_viewing_today(&self) -> bool {
        self.selected == self.today
    }

    /// Whether ledger changes reach the store.
    pub fn is_persisting(&self) -> bool {
        self.persisting
    }

    /// Registers a view callback, run after the store has seen the change.
    pub fn subscribe(&mut self, listener: ChangeListener) {
        self.ledger.subscribe(listener);
    }

    pub fn add_habit(&mut self, name: &str) -> Result<Habit, LedgerError> {
        self.add_habit_in(name, CUSTOM_CATEGORY)
    }

    pub fn add_habit_in(&mut self, name: &str, category: &str) -> Result<Habit, LedgerError> {
        let created_at = self.clock.now_utc();
        self.ledger.add_habit_at(name, category, created_at)
    }

    pub fn delete_habit(&mut self, habit_id: &str) -> Result<Habit, LedgerError> {
        self.ledger.delete_habit(habit_id)
    }

    /// Toggles the habit on the selected date and returns the new value.
    pub fn toggle_habit(&mut self, habit_id: &str) -> Result<bool, LedgerError> {
        self.ledger.toggle_completion(habit_id, self.selected)
    }

    pub fn set_completion(
        &mut self,
        habit_id: &str,
        date: DateKey,
        completed: bool,
    ) -> Result<(), LedgerError> {
        self.ledger.set_completion(habit_id, date, completed)
    }

    /// Moves the selection by `delta` days. Returns `false`, leaving the
    /// selection unchanged, if that would land after today.
    pub fn navigate_date(&mut self, delta: i64) -> bool {
        self.select_date(self.selected.offset(delta))
    }

    pub fn select_date(&mut self, date: DateKey) -> bool {
        if date > self.today {
            debug!(%date, today = %self.today, "refusing to select a future date");
            return false;
        }
        self.selected = date;
        true
    }

    pub fn go_to_today(&mut self) {
        self.selected = self.today;
    }

    /// Re-reads the clock. A selection that was on the old "today" follows
    /// the day change. Returns whether the day changed.
    pub fn refresh_today(&mut self) -> bool {
        let now = self.clock.today();
        if now == self.today {
            return false;
        }
        let was_on_today = self.selected == self.today;
        self.today = now;
        if was_on_today || self.selected > now {
            self.selected = now;
        }
        info!(today = %now, "day rolled over");
        true
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::compute(&self.ledger, self.today)
    }

    pub fn all_time(&self) -> AllTimeStats {
        AllTimeStats::compute(&self.ledger, self.today)
    }

    pub fn chart(&self, period: ChartPeriod) -> Vec<ChartPoint> {
        chart_series(&self.ledger, period, self.today)
    }

    pub fn habit_streak(&self, habit_id: &str) -> u32 {
        habit_streak(&self.ledger, habit_id, self.today)
    }

    pub fn feedback<R: Rng + ?Sized>(&self, rng: &mut R) -> FeedbackMessage {
        feedback_message(&self.snapshot(), self.clock.hour(), rng)
    }

    pub fn update_settings(&mut self, update: impl FnOnce(&mut Settings)) {
        update(&mut self.settings);
        if let Err(err) = self.store.save_settings(&self.settings) {
            warn!(%err, "failed to persist settings");
        }
    }

    pub fn export(&self) -> ExportDocument {
        ExportDocument::capture(&self.ledger, &self.settings, self.clock.now_utc())
    }

    /// Replaces habits, records and settings with the document's contents.
    pub fn import(&mut self, document: ExportDocument) -> Result<(), ImportError> {
        document.validate()?;
        let (habits, records, settings) = document.into_parts();
        info!(habit_count = habits.len(), recorded_days = records.len(), "importing backup");
        self.ledger.replace(habits, records);
        self.update_settings(|current| *current = settings);
        Ok(())
    }

    /// Wipes persisted state and starts over with the default habits.
    pub fn reset(&mut self) {
        if !self.persisting {
            warn!("saved ledger is unreadable, resetting in memory only");
        } else if let Err(err) = self.store.clear() {
            warn!(%err, "failed to clear persisted state");
        }
        self.ledger.replace(default_habits(), Records::new());
        self.update_settings(|current| *current = Settings::default());
        self.selected = self.today;
        info!("reset to defaults");
    }

    /// Adopts the remote mirror's contents if they are newer. Sync failures
    /// are logged and leave the local ledger in charge.
    pub fn reconcile_remote(&mut self) -> bool {
        match self.store.reconcile_remote(&self.ledger) {
            Ok(Some(remote)) => {
                info!(updated_at = %remote.updated_at, "adopting newer remote ledger");
                self.ledger
                    .adopt_remote(remote.habits, remote.records, remote.updated_at);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(%err, "remote sync unavailable, continuing locally");
                false
            }
        }
    }
}

fn store_listener(store: Arc<dyn LedgerStore>) -> ChangeListener {
    Arc::new(move |ledger: &Ledger, change: &LedgerChange| {
        persist(store.as_ref(), ledger, change)
    })
}

fn persist(store: &dyn LedgerStore, ledger: &Ledger, change: &LedgerChange) {
    if let Err(err) = store.on_ledger_changed(ledger, change) {
        warn!(%err, ?change, "failed to persist ledger change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    use crate::clock::FixedClock;

    fn fixture(now: &str) -> (HabitSession, Arc<MemoryStore>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(DateTime::parse_from_rfc3339(now).unwrap()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let session = HabitSession::builder()
            .with_store(store.clone())
            .with_clock(clock.clone())
            .build();
        (session, store, clock)
    }

    #[test]
    fn first_run_seeds_defaults_without_stamping() {
        let (session, store, _) = fixture("2025-10-20T09:00:00+02:00");
        assert_eq!(session.ledger().habit_count(), 5);
        let saved = store.snapshot();
        assert_eq!(saved.habits.map(|h| h.len()), Some(5));
        assert_eq!(saved.updated_at, None);
    }

    #[test]
    fn mutations_are_flushed_to_the_store() {
        let (mut session, store, _) = fixture("2025-10-20T09:00:00+02:00");
        assert!(session.toggle_habit("h1").unwrap());
        let saved = store.snapshot();
        let records = saved.records.unwrap();
        assert!(records[&session.today()].is_completed("h1"));
        assert!(saved.updated_at.is_some());
    }

    #[test]
    fn failed_writes_keep_in_memory_state() {
        let (mut session, store, _) = fixture("2025-10-20T09:00:00+02:00");
        store.set_fail_writes(true);
        let habit = session.add_habit("Stretch").unwrap();
        assert!(session.ledger().contains_habit(habit.id.as_str()));
        assert_eq!(store.snapshot().habits.map(|h| h.len()), Some(5));
    }

    #[test]
    fn unreadable_records_keep_the_session_off_the_store() {
        let clock = Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2025-10-20T09:00:00+02:00").unwrap(),
        ));
        let saved = StoredState {
            habits: Some(vec![Habit::new("h9", "Stretch", CUSTOM_CATEGORY)]),
            unreadable: vec![crate::store::RECORDS_KEY],
            ..StoredState::default()
        };
        let store = Arc::new(MemoryStore::with_state(saved.clone(), clock.clone()));
        let mut session = HabitSession::builder()
            .with_store(store.clone())
            .with_clock(clock)
            .build();

        assert!(!session.is_persisting());
        assert!(session.ledger().contains_habit("h9"));
        session.toggle_habit("h9").unwrap();
        session.add_habit("Walk").unwrap();
        session.reset();
        assert_eq!(store.snapshot().habits, saved.habits);
        assert_eq!(store.snapshot().updated_at, None);
    }

    #[test]
    fn navigation_never_passes_today() {
        let (mut session, _, _) = fixture("2025-10-20T09:00:00+02:00");
        let today = session.today();
        assert!(!session.navigate_date(1));
        assert_eq!(session.selected_date(), today);
        assert!(session.navigate_date(-3));
        assert_eq!(session.selected_date(), today.offset(-3));
        assert!(!session.select_date(today.offset(2)));
        assert_eq!(session.selected_date(), today.offset(-3));
        assert!(session.navigate_date(3));
        assert!(session.is_viewing_today());
    }

    #[test]
    fn toggle_applies_to_selected_date() {
        let (mut session, _, _) = fixture("2025-10-20T09:00:00+02:00");
        session.navigate_date(-1);
        session.toggle_habit("h2").unwrap();
        let yesterday = session.today().offset(-1);
        assert!(session.ledger().is_completed("h2", yesterday));
        assert!(!session.ledger().is_completed("h2", session.today()));
    }

    #[test]
    fn rollover_moves_selection_that_was_on_today() {
        let (mut session, _, clock) = fixture("2025-10-20T23:30:00+02:00");
        let before = session.today();
        clock.advance(chrono::Duration::hours(1));
        assert!(session.refresh_today());
        assert_eq!(session.today(), before.offset(1));
        assert!(session.is_viewing_today());
        assert!(!session.refresh_today());
    }

    #[test]
    fn reset_restores_defaults_and_settings() {
        let (mut session, store, _) = fixture("2025-10-20T09:00:00+02:00");
        session.delete_habit("h1").unwrap();
        session.toggle_habit("h2").unwrap();
        session.update_settings(|s| s.notifications = true);

        session.reset();

        assert_eq!(session.ledger().habits(), default_habits().as_slice());
        assert!(session.ledger().records().is_empty());
        assert_eq!(*session.settings(), Settings::default());
        assert_eq!(store.snapshot().settings, Some(Settings::default()));
    }

    #[test]
    fn feedback_uses_clock_hour() {
        let (session, _, _) = fixture("2025-10-20T21:00:00+02:00");
        let mut rng = rand::thread_rng();
        let message = session.feedback(&mut rng);
        assert_eq!(message.category, crate::feedback::FeedbackCategory::Generic);
    }
}
