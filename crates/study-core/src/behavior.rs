//! Study behavior analysis over the trailing week of sessions.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::calendar::StudyCalendar;
use crate::models::{PlanRequest, StudyBehavior, StudySession};

/// Length of the analysis window.
pub const WINDOW_DAYS: i64 = 7;

/// Average session length at which the focus score saturates.
pub const FOCUS_TARGET_MINUTES: u32 = 20;

/// Upper bound for a target grown by long sessions. Targets already above
/// it are never shrunk by the upscale.
pub const ADAPTIVE_UPSCALE_CAP: u32 = 80;

/// Whether a session started inside the trailing window ending at `now`.
pub fn in_window(session: &StudySession, now: DateTime<Utc>) -> bool {
    session.started_at > now - Duration::days(WINDOW_DAYS) && session.started_at <= now
}

/// Derive behavior metrics from sessions; those outside the window are ignored.
pub fn compute_behavior(
    sessions: &[StudySession],
    now: DateTime<Utc>,
    calendar: &StudyCalendar,
) -> StudyBehavior {
    let window: Vec<&StudySession> = sessions.iter().filter(|s| in_window(s, now)).collect();
    if window.is_empty() {
        return StudyBehavior::default();
    }

    let count = window.len() as u64;
    let total_seconds: u64 = window.iter().map(|s| u64::from(s.duration_seconds)).sum();
    // Any recorded session counts as at least a minute.
    let avg_duration_minutes = rounded_div(total_seconds, 60 * count).max(1) as u32;

    let mut hour_seconds = [0u64; 24];
    for session in &window {
        hour_seconds[calendar.hour_of(session.started_at) as usize] +=
            u64::from(session.duration_seconds);
    }
    // Earliest hour wins a tie.
    let preferred_hour = hour_seconds
        .iter()
        .enumerate()
        .fold(0usize, |best, (hour, secs)| {
            if *secs > hour_seconds[best] {
                hour
            } else {
                best
            }
        }) as i8;

    let today = calendar.day_of(now);
    let today_seconds: u64 = window
        .iter()
        .filter(|s| calendar.day_of(s.started_at) == today)
        .map(|s| u64::from(s.duration_seconds))
        .sum();

    let first_day = today - Duration::days(WINDOW_DAYS - 1);
    let active_days: HashSet<_> = window
        .iter()
        .map(|s| calendar.day_of(s.started_at))
        .filter(|d| *d >= first_day && *d <= today)
        .collect();

    StudyBehavior {
        avg_duration_minutes,
        preferred_hour,
        focus_score: focus_score(avg_duration_minutes),
        consistency_score: consistency_score(active_days.len()),
        sessions_last_7_days: window.len() as u32,
        today_minutes: rounded_div(today_seconds, 60) as u32,
    }
}

/// 0..=100, growing linearly until `FOCUS_TARGET_MINUTES`.
pub fn focus_score(avg_minutes: u32) -> u8 {
    let scaled = u64::from(avg_minutes) * 100 / u64::from(FOCUS_TARGET_MINUTES);
    scaled.min(100) as u8
}

/// Share of the window's days with at least one session, as 0..=100.
pub fn consistency_score(active_days: usize) -> u8 {
    let days = (active_days as u64).min(WINDOW_DAYS as u64);
    rounded_div(days * 100, WINDOW_DAYS as u64) as u8
}

/// Scale a daily target by how long recent sessions ran.
///
/// Short sessions (under 5 minutes on average) shrink the target by a fifth;
/// long ones (over 20) grow it by a tenth, up to [`ADAPTIVE_UPSCALE_CAP`].
/// Without sessions the target is kept. The result stays within the plan
/// request bounds.
pub fn adaptive_target(daily_target: u32, behavior: &StudyBehavior) -> u32 {
    let adjusted = if behavior.sessions_last_7_days == 0 {
        daily_target
    } else if behavior.avg_duration_minutes < 5 {
        rounded_div(u64::from(daily_target) * 8, 10) as u32
    } else if behavior.avg_duration_minutes > 20 {
        let grown = rounded_div(u64::from(daily_target) * 11, 10) as u32;
        grown.min(ADAPTIVE_UPSCALE_CAP.max(daily_target))
    } else {
        daily_target
    };
    adjusted.clamp(PlanRequest::MIN_DAILY_TARGET, PlanRequest::MAX_DAILY_TARGET)
}

fn rounded_div(num: u64, den: u64) -> u64 {
    if den == 0 {
        0
    } else {
        (num + den / 2) / den
    }
}
