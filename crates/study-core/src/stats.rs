//! Study day and streak tracking.

use chrono::NaiveDate;
use tracing::info;

use crate::models::StudyStats;

/// Record a study event on `today`.
///
/// A second event on the same day changes nothing. The first event of a
/// day counts toward `total_days` and either extends the streak (studied
/// yesterday) or restarts it at 1.
pub fn record_study_day(previous: &StudyStats, today: NaiveDate) -> StudyStats {
    let mut stats = previous.clone();
    match previous.last_study_date {
        Some(last) if last >= today => return stats,
        Some(last) if last.succ_opt() == Some(today) => {
            stats.streak_days = previous.streak_days.saturating_add(1).max(2);
        }
        Some(last) => {
            info!(%last, %today, broken = previous.streak_days, "study streak reset");
            stats.streak_days = 1;
        }
        None => stats.streak_days = 1,
    }
    stats.total_days = previous.total_days.saturating_add(1);
    stats.last_study_date = Some(today);
    stats
}

impl StudyStats {
    /// The stats as seen on `today`.
    ///
    /// A streak is only current while the last study day is today or
    /// yesterday; past that it reads as 0 until the next study day restarts
    /// it.
    pub fn as_of(&self, today: NaiveDate) -> StudyStats {
        let mut view = self.clone();
        let current = match self.last_study_date {
            Some(last) => last == today || last.succ_opt() == Some(today),
            None => false,
        };
        if !current {
            view.streak_days = 0;
        }
        view
    }
}
