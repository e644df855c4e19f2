//! Motivational feedback: an ordered cascade of rules picks a category,
//! then a template from that category's pool is chosen at random.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::stats::StatsSnapshot;

/// Hour (local, 0-23) after which an empty day no longer gets the early nudge.
pub const EARLY_NUDGE_CUTOFF_HOUR: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackCategory {
    Perfect,
    Streak,
    Strong,
    Trending,
    Encouragement,
    EarlyNudge,
    Generic,
}

impl FeedbackCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            FeedbackCategory::Perfect => "perfect",
            FeedbackCategory::Streak => "streak",
            FeedbackCategory::Strong => "strong",
            FeedbackCategory::Trending => "trending",
            FeedbackCategory::Encouragement => "encouragement",
            FeedbackCategory::EarlyNudge => "early-nudge",
            FeedbackCategory::Generic => "generic",
        }
    }

    pub const fn templates(self) -> &'static [&'static str] {
        match self {
            FeedbackCategory::Perfect => &[
                "🎉 Perfect day! You've completed all your habits. Your consistency is building unstoppable momentum!",
                "💯 Incredible! 100% completion today. You're proving that excellence is a habit, not an act!",
                "⭐ Outstanding performance! Days like this compound into life-changing results!",
            ],
            FeedbackCategory::Streak => &[
                "🔥 {streak} days in a row! You're on fire! This streak is becoming your new identity!",
                "💪 {streak}-day streak! You've moved from motivation to discipline. Keep going!",
                "🚀 Wow! {streak} consecutive days! Keep the chain alive!",
            ],
            FeedbackCategory::Strong => &[
                "🌟 Excellent progress today! You're so close to a perfect score. One more push!",
                "💪 Strong performance! {today}% done, you're building the foundation for lasting change!",
                "✨ Great job! Your consistency is inspiring. Tomorrow, aim for 100%!",
            ],
            FeedbackCategory::Trending => &[
                "📈 Your weekly average is {weekly}%! You're trending upward. Success is inevitable!",
                "🎯 Solid {weekly}% weekly completion! Keep stacking good days!",
                "💫 {weekly}% this week! Your future self will thank you for this consistency!",
            ],
            FeedbackCategory::Encouragement => &[
                "🌱 Every habit counts! You've started, and that's what matters. Finish strong!",
                "💡 Progress over perfection! Each checked box is a vote for your best self!",
                "🔄 You're building momentum! Complete one more habit to unlock your potential!",
            ],
            FeedbackCategory::EarlyNudge => &[
                "☀️ The day is still young! Start with your easiest habit to build momentum!",
                "🎯 Your future depends on what you do today. Start with just one habit!",
                "⏰ Perfect time to start! Pick one habit and check it off.",
            ],
            FeedbackCategory::Generic => &[
                "🌟 Remember: You're not just building habits, you're building a new identity!",
                "💭 Small daily improvements lead to staggering long-term results. Keep going!",
                "🏆 You're closer than you think. One more day of effort makes all the difference!",
            ],
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct FeedbackRule {
    category: FeedbackCategory,
    applies: fn(&StatsSnapshot, u32) -> bool,
}

/// Evaluated top to bottom; the first matching rule wins.
const RULES: &[FeedbackRule] = &[
    FeedbackRule {
        category: FeedbackCategory::Perfect,
        applies: perfect_today,
    },
    FeedbackRule {
        category: FeedbackCategory::Streak,
        applies: week_long_streak,
    },
    FeedbackRule {
        category: FeedbackCategory::Strong,
        applies: strong_today,
    },
    FeedbackRule {
        category: FeedbackCategory::Trending,
        applies: trending_week,
    },
    FeedbackRule {
        category: FeedbackCategory::Encouragement,
        applies: started_today,
    },
    FeedbackRule {
        category: FeedbackCategory::EarlyNudge,
        applies: nothing_yet_early,
    },
];

fn perfect_today(stats: &StatsSnapshot, _hour: u32) -> bool {
    stats.today_completion_pct == 100
}

fn week_long_streak(stats: &StatsSnapshot, _hour: u32) -> bool {
    stats.current_streak >= 7
}

fn strong_today(stats: &StatsSnapshot, _hour: u32) -> bool {
    stats.today_completion_pct >= 80
}

fn trending_week(stats: &StatsSnapshot, _hour: u32) -> bool {
    stats.weekly_avg_pct >= 70
}

fn started_today(stats: &StatsSnapshot, _hour: u32) -> bool {
    stats.today_completion_pct > 0 && stats.today_completion_pct < 50
}

fn nothing_yet_early(stats: &StatsSnapshot, hour: u32) -> bool {
    stats.today_completion_pct == 0 && hour < EARLY_NUDGE_CUTOFF_HOUR
}

pub fn select_category(stats: &StatsSnapshot, hour: u32) -> FeedbackCategory {
    RULES
        .iter()
        .find(|rule| (rule.applies)(stats, hour))
        .map(|rule| rule.category)
        .unwrap_or(FeedbackCategory::Generic)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub category: FeedbackCategory,
    pub text: String,
}

/// Picks the category for `stats` and a uniformly random template from it.
pub fn feedback_message<R: Rng + ?Sized>(
    stats: &StatsSnapshot,
    hour: u32,
    rng: &mut R,
) -> FeedbackMessage {
    let category = select_category(stats, hour);
    let template = category
        .templates()
        .choose(rng)
        .copied()
        .unwrap_or_default();
    FeedbackMessage {
        category,
        text: render(template, stats),
    }
}

fn render(template: &str, stats: &StatsSnapshot) -> String {
    template
        .replace("{streak}", &stats.current_streak.to_string())
        .replace("{weekly}", &stats.weekly_avg_pct.to_string())
        .replace("{today}", &stats.today_completion_pct.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn stats(today: u8, weekly: u8, streak: u32) -> StatsSnapshot {
        StatsSnapshot {
            today_completion_pct: today,
            weekly_avg_pct: weekly,
            current_streak: streak,
            total_habits: 3,
        }
    }

    #[test]
    fn cascade_respects_priority() {
        assert_eq!(select_category(&stats(100, 10, 9), 9), FeedbackCategory::Perfect);
        assert_eq!(select_category(&stats(90, 90, 7), 9), FeedbackCategory::Streak);
        assert_eq!(select_category(&stats(80, 90, 6), 9), FeedbackCategory::Strong);
        assert_eq!(select_category(&stats(67, 71, 0), 9), FeedbackCategory::Trending);
        assert_eq!(select_category(&stats(20, 10, 0), 9), FeedbackCategory::Encouragement);
        assert_eq!(select_category(&stats(0, 10, 0), 19), FeedbackCategory::EarlyNudge);
        assert_eq!(select_category(&stats(0, 10, 0), 20), FeedbackCategory::Generic);
        assert_eq!(select_category(&stats(50, 10, 0), 9), FeedbackCategory::Generic);
    }

    #[test]
    fn messages_come_from_the_selected_pool_with_values_filled_in() {
        let mut rng = StdRng::seed_from_u64(7);
        let snapshot = stats(10, 10, 12);
        for _ in 0..20 {
            let message = feedback_message(&snapshot, 9, &mut rng);
            assert_eq!(message.category, FeedbackCategory::Streak);
            assert!(message.text.contains("12"));
            assert!(!message.text.contains('{'));
        }
    }

    #[test]
    fn every_pool_has_templates() {
        for category in [
            FeedbackCategory::Perfect,
            FeedbackCategory::Streak,
            FeedbackCategory::Strong,
            FeedbackCategory::Trending,
            FeedbackCategory::Encouragement,
            FeedbackCategory::EarlyNudge,
            FeedbackCategory::Generic,
        ] {
            assert!(!category.templates().is_empty(), "{category} has no templates");
        }
        assert_eq!(
            serde_json::to_string(&FeedbackCategory::EarlyNudge).unwrap(),
            "\"early-nudge\""
        );
    }
}
