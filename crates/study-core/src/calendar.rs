//! Calendar-day boundaries.
//!
//! Streaks, today's counts and session buckets all compare calendar days.
//! Every such comparison goes through one [`StudyCalendar`] so a single
//! fixed offset decides where a day starts.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};

use crate::error::{StudyError, StudyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudyCalendar {
    offset: FixedOffset,
}

impl StudyCalendar {
    /// Days start at midnight UTC.
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Days start at local midnight for an offset east of UTC.
    pub fn from_offset_minutes(minutes: i32) -> StudyResult<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or_else(|| StudyError::InvalidInput(format!("UTC offset of {minutes} minutes")))
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub fn hour_of(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.offset).hour()
    }

    /// The instant a calendar day begins.
    pub fn start_of(&self, day: NaiveDate) -> DateTime<Utc> {
        let local = day.and_time(NaiveTime::MIN);
        (local - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    /// Half-open `[start, end)` range of the day containing `now`.
    pub fn day_bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_of(self.day_of(now));
        (start, start + Duration::days(1))
    }
}

impl Default for StudyCalendar {
    fn default() -> Self {
        Self::utc()
    }
}
