use std::fs;
use std::sync::Arc;

use chrono::DateTime;
use habit_core::clock::{Clock, FixedClock};
use habit_core::export::ExportDocument;
use habit_core::settings::Theme;
use habit_core::store::{JsonFileStore, LedgerStore};
use habit_core::HabitSession;
use tempfile::tempdir;

fn clock(now: &str) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        DateTime::parse_from_rfc3339(now).expect("valid timestamp"),
    ))
}

fn open_session(dir: &std::path::Path, clock: Arc<FixedClock>) -> HabitSession {
    let store = JsonFileStore::open(dir, clock.clone()).expect("open store");
    HabitSession::builder()
        .with_store(Arc::new(store))
        .with_clock(clock)
        .build()
}

#[test]
fn habits_records_and_settings_survive_restart() {
    let temp = tempdir().expect("tempdir");
    let clock = clock("2025-10-20T08:00:00+02:00");

    let stretch_id = {
        let mut session = open_session(temp.path(), clock.clone());
        let stretch = session.add_habit("Stretch").expect("add habit");
        session.toggle_habit("h1").expect("toggle");
        session.toggle_habit(stretch.id.as_str()).expect("toggle");
        session.delete_habit("h5").expect("delete");
        session.update_settings(|settings| settings.theme = Theme::Dark);
        stretch.id
    };

    for blob in ["habits.json", "records.json", "settings.json", "last_update.json"] {
        assert!(temp.path().join(blob).exists(), "{blob} should be written");
    }

    let session = open_session(temp.path(), clock.clone());
    let ledger = session.ledger();
    assert_eq!(ledger.habit_count(), 5);
    assert!(ledger.contains_habit(stretch_id.as_str()));
    assert!(!ledger.contains_habit("h5"));
    assert_eq!(ledger.completed_count(clock.today()), 2);
    assert_eq!(session.settings().theme, Theme::Dark);
}

#[test]
fn corrupt_storage_degrades_to_defaults_without_overwriting() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("records.json"), "{{{").expect("write fixture");

    let mut session = open_session(temp.path(), clock("2025-10-20T08:00:00+02:00"));
    assert_eq!(session.ledger().habit_count(), 5);
    assert!(session.ledger().records().is_empty());
    assert!(!session.is_persisting());

    session.toggle_habit("h1").expect("toggle still works in memory");
    session.add_habit("Stretch").expect("add still works in memory");
    assert!(!temp.path().join("habits.json").exists());
    assert!(!temp.path().join("last_update.json").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("records.json")).expect("read"),
        "{{{"
    );
}

#[test]
fn bad_settings_blob_leaves_history_intact() {
    let temp = tempdir().expect("tempdir");
    let clock = clock("2025-10-20T08:00:00+02:00");

    let stretch_id = {
        let mut session = open_session(temp.path(), clock.clone());
        let stretch = session.add_habit("Stretch").expect("add habit");
        for _ in 0..30 {
            session.toggle_habit("h1").expect("toggle");
            session.navigate_date(-1);
        }
        stretch.id
    };
    fs::write(temp.path().join("settings.json"), r#"{"theme":"sepia"}"#).expect("write fixture");

    let mut session = open_session(temp.path(), clock.clone());
    assert!(session.is_persisting());
    assert_eq!(session.settings().theme, Theme::Auto);
    assert_eq!(session.ledger().records().len(), 30);

    session.toggle_habit("h2").expect("toggle");
    session.add_habit("Walk").expect("add habit");

    let reopened = open_session(temp.path(), clock.clone());
    let ledger = reopened.ledger();
    assert_eq!(ledger.records().len(), 30);
    assert!(ledger.contains_habit(stretch_id.as_str()));
    assert!(ledger.is_completed("h1", clock.today().offset(-29)));
    assert!(ledger.is_completed("h2", clock.today()));
}

#[test]
fn export_then_import_reproduces_the_ledger() {
    let source_dir = tempdir().expect("tempdir");
    let target_dir = tempdir().expect("tempdir");
    let clock = clock("2025-10-20T08:00:00+02:00");

    let mut source = open_session(source_dir.path(), clock.clone());
    source.add_habit("Stretch").expect("add");
    source.toggle_habit("h2").expect("toggle");
    source.navigate_date(-2);
    source.toggle_habit("h3").expect("toggle");
    let json = source.export().to_json_pretty().expect("serialize");

    let mut target = open_session(target_dir.path(), clock.clone());
    target
        .import(ExportDocument::from_json(&json).expect("parse export"))
        .expect("import");
    assert_eq!(target.ledger(), source.ledger());

    let reopened = open_session(target_dir.path(), clock);
    assert_eq!(reopened.ledger(), source.ledger());
}

#[test]
fn store_reports_last_update_after_mutation() {
    let temp = tempdir().expect("tempdir");
    let clock = clock("2025-10-20T08:00:00+02:00");
    let store = Arc::new(JsonFileStore::open(temp.path(), clock.clone()).expect("open"));
    let mut session = HabitSession::builder()
        .with_store(store.clone())
        .with_clock(clock.clone())
        .build();
    assert_eq!(store.last_updated().expect("read stamp"), None);

    session.toggle_habit("h1").expect("toggle");
    assert_eq!(store.last_updated().expect("read stamp"), Some(clock.now_utc()));
}
