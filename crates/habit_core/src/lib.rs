pub mod calendar;
pub mod clock;
pub mod error;
pub mod export;
pub mod feedback;
pub mod habit;
pub mod ledger;
pub mod session;
pub mod settings;
pub mod stats;
pub mod store;
pub mod streak;

pub use crate::calendar::DateKey;
pub use crate::habit::{DayRecord, Habit, HabitId, Records};
pub use crate::ledger::{Ledger, LedgerChange};
pub use crate::session::{HabitSession, HabitSessionBuilder};
pub use crate::stats::StatsSnapshot;
