//! Streaks are walks over calendar days. A day missing from the ledger
//! counts as "nothing completed".

use crate::calendar::DateKey;
use crate::ledger::Ledger;

/// Consecutive days, ending at `as_of`, on which the habit was completed.
/// Zero when `as_of` itself is not completed or the habit is not defined.
pub fn habit_streak(ledger: &Ledger, habit_id: &str, as_of: DateKey) -> u32 {
    if !ledger.contains_habit(habit_id) {
        return 0;
    }
    walk_back(as_of, |day| ledger.is_completed(habit_id, day))
}

/// Consecutive perfect days. An unfinished `as_of` does not break the
/// streak: the walk then starts from the day before.
pub fn current_aggregate_streak(ledger: &Ledger, as_of: DateKey) -> u32 {
    if ledger.habit_count() == 0 {
        return 0;
    }
    let start = if ledger.is_perfect_day(as_of) {
        as_of
    } else {
        match as_of.pred() {
            Some(previous) => previous,
            None => return 0,
        }
    };
    walk_back(start, |day| ledger.is_perfect_day(day))
}

/// Longest run ever observed up to `as_of`, over each habit's completions
/// and over perfect days. Always at least as large as any current streak.
pub fn best_streak_ever(ledger: &Ledger, as_of: DateKey) -> u32 {
    let recorded = ledger.records().range(..=as_of);

    let best_habit_run = ledger
        .habits()
        .iter()
        .map(|habit| {
            longest_run(
                recorded
                    .clone()
                    .filter(|(_, record)| record.is_completed(habit.id.as_str()))
                    .map(|(day, _)| *day),
            )
        })
        .max()
        .unwrap_or(0);

    let best_perfect_run = longest_run(
        recorded
            .filter(|(day, _)| ledger.is_perfect_day(**day))
            .map(|(day, _)| *day),
    );

    best_habit_run.max(best_perfect_run)
}

fn walk_back(start: DateKey, mut counts: impl FnMut(DateKey) -> bool) -> u32 {
    let mut streak = 0;
    let mut day = start;
    while counts(day) {
        streak += 1;
        match day.pred() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

/// Longest run of consecutive days in an ascending sequence of days.
fn longest_run(days: impl Iterator<Item = DateKey>) -> u32 {
    let mut best = 0;
    let mut current = 0;
    let mut last: Option<DateKey> = None;
    for day in days {
        current = match last {
            Some(previous) if day.days_since(previous) == 1 => current + 1,
            _ => 1,
        };
        best = best.max(current);
        last = Some(day);
    }
    best
}
