use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar::DateKey;
use crate::error::ParseError;
use crate::ledger::{percent, Ledger};
use crate::streak::{best_streak_ever, current_aggregate_streak};

pub const WEEK_DAYS: u32 = 7;

/// Derived figures for "today"; recomputed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub today_completion_pct: u8,
    pub weekly_avg_pct: u8,
    pub current_streak: u32,
    pub total_habits: usize,
}

impl StatsSnapshot {
    pub fn compute(ledger: &Ledger, today: DateKey) -> Self {
        Self {
            today_completion_pct: ledger.completion_percent(today),
            weekly_avg_pct: period_average(ledger, WEEK_DAYS, today),
            current_streak: current_aggregate_streak(ledger, today),
            total_habits: ledger.habit_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTimeStats {
    pub total_completed: usize,
    pub average_completion: u8,
    pub best_streak: u32,
    pub days_tracked: usize,
}

impl AllTimeStats {
    pub fn compute(ledger: &Ledger, as_of: DateKey) -> Self {
        Self {
            total_completed: total_completed_all_time(ledger),
            average_completion: average_completion_all_time(ledger),
            best_streak: best_streak_ever(ledger, as_of),
            days_tracked: days_tracked(ledger),
        }
    }
}

/// Average completion over the inclusive window `[as_of - (days - 1), as_of]`,
/// measured against the current habit count and rounded once at the end.
pub fn period_average(ledger: &Ledger, days: u32, as_of: DateKey) -> u8 {
    if days == 0 || ledger.habit_count() == 0 {
        return 0;
    }
    let start = as_of.offset(-(i64::from(days) - 1));
    let completed: usize = ledger
        .records()
        .range(start..=as_of)
        .map(|(day, _)| ledger.completed_count(*day))
        .sum();
    percent(completed, ledger.habit_count() * days as usize)
}

pub fn total_completed_all_time(ledger: &Ledger) -> usize {
    ledger
        .records()
        .keys()
        .map(|day| ledger.completed_count(*day))
        .sum()
}

/// Stored days with at least one completion.
pub fn days_tracked(ledger: &Ledger) -> usize {
    ledger
        .records()
        .keys()
        .filter(|day| ledger.completed_count(**day) > 0)
        .count()
}

pub fn average_completion_all_time(ledger: &Ledger) -> u8 {
    percent(
        total_completed_all_time(ledger),
        days_tracked(ledger) * ledger.habit_count(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartPeriod {
    #[default]
    Week,
    Month,
    Year,
}

impl ChartPeriod {
    pub const fn days(self) -> u32 {
        match self {
            ChartPeriod::Week => 7,
            ChartPeriod::Month => 30,
            ChartPeriod::Year => 365,
        }
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChartPeriod::Week => "week",
            ChartPeriod::Month => "month",
            ChartPeriod::Year => "year",
        };
        f.write_str(label)
    }
}

impl FromStr for ChartPeriod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(ChartPeriod::Week),
            "month" => Ok(ChartPeriod::Month),
            "year" => Ok(ChartPeriod::Year),
            _ => Err(ParseError::UnknownVariant {
                kind: "chart period",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: DateKey,
    pub percent: u8,
}

/// Per-day completion for the trailing period ending at `as_of`, oldest first.
pub fn chart_series(ledger: &Ledger, period: ChartPeriod, as_of: DateKey) -> Vec<ChartPoint> {
    let days = i64::from(period.days());
    (0..days)
        .rev()
        .map(|back| {
            let date = as_of.offset(-back);
            ChartPoint {
                date,
                percent: ledger.completion_percent(date),
            }
        })
        .collect()
}
