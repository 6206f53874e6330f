//! Plain text and JSON output.

use anyhow::Result;
use serde::Serialize;
use study_core::{
    ImportSummary, Overview, SessionAck, StudyBehavior, StudyStats, TodayPlan, Word,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Render `value` as pretty JSON, or with `plain` otherwise.
pub fn render<T: Serialize>(
    format: OutputFormat,
    value: &T,
    plain: impl FnOnce(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Plain => Ok(plain(value)),
    }
}

pub fn word_line(word: &Word) -> String {
    let next = word
        .next_review_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "new".to_string());
    format!(
        "{}  {:<20} lvl {}  next {}  {}",
        word.id, word.term, word.familiarity, next, word.definition
    )
}

pub fn word_detail(word: &Word) -> String {
    let mut lines = vec![word_line(word)];
    if !word.meanings.is_empty() {
        lines.push(format!("  meanings: {}", word.meanings.join("; ")));
    }
    if let Some(example) = word.example() {
        lines.push(format!("  example: {example}"));
    }
    if let Some(root) = &word.word_root {
        lines.push(format!("  root: {root}"));
    }
    if !word.similar_words.is_empty() {
        lines.push(format!("  similar: {}", word.similar_words.join(", ")));
    }
    if let Some(tag) = &word.exam_tag {
        lines.push(format!("  exam: {tag}"));
    }
    lines.join("\n")
}

pub fn words(words: &Vec<Word>) -> String {
    if words.is_empty() {
        return "(no words)".to_string();
    }
    words.iter().map(word_line).collect::<Vec<_>>().join("\n")
}

pub fn plan(plan: &TodayPlan) -> String {
    let mut out = format!(
        "{} to study, {} reviewed today",
        plan.words.len(),
        plan.today_count
    );
    for (i, word) in plan.words.iter().enumerate() {
        let kind = if word.has_review_history() { "review" } else { "new" };
        out.push_str(&format!("\n{:>3}. [{kind}] {} - {}", i + 1, word.term, word.definition));
    }
    out
}

pub fn stats(stats: &StudyStats) -> String {
    let last = stats
        .last_study_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "Study days: {}\nStreak: {} days\nLast studied: {}\nReviewed today: {}",
        stats.total_days, stats.streak_days, last, stats.today_count
    )
}

pub fn overview(overview: &Overview) -> String {
    format!(
        "Words: {}\nDue now: {}\n{}",
        overview.word_count,
        overview.due_count,
        stats(&overview.stats)
    )
}

pub fn behavior(behavior: &StudyBehavior) -> String {
    let hour = if behavior.preferred_hour < 0 {
        "-".to_string()
    } else {
        format!("{:02}:00", behavior.preferred_hour)
    };
    format!(
        "Sessions (7 days): {}\nAverage session: {} min\nPreferred hour: {}\nFocus: {}\nConsistency: {}\nToday: {} min",
        behavior.sessions_last_7_days,
        behavior.avg_duration_minutes,
        hour,
        behavior.focus_score,
        behavior.consistency_score,
        behavior.today_minutes
    )
}

pub fn import(summary: &ImportSummary) -> String {
    format!("Imported {}, skipped {}", summary.imported, summary.skipped)
}

pub fn session(ack: &SessionAck) -> String {
    match ack {
        SessionAck::Recorded => "Session recorded".to_string(),
        SessionAck::TooShort => "Session too short, not recorded".to_string(),
        SessionAck::Dropped => "Session could not be stored".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use study_core::WordDraft;

    fn word() -> Word {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Word::new(
            "alice",
            WordDraft::new("candid", "frank").with_example("A candid answer."),
            now,
        )
    }

    #[test]
    fn test_plain_plan_marks_new_words() {
        let out = plan(&TodayPlan {
            words: vec![word()],
            today_count: 3,
        });
        assert!(out.starts_with("1 to study, 3 reviewed today"));
        assert!(out.contains("[new] candid - frank"));
    }

    #[test]
    fn test_json_output() {
        let ack = SessionAck::TooShort;
        let out = render(OutputFormat::Json, &ack, session).unwrap();
        assert_eq!(out, "\"too_short\"");

        let out = render(OutputFormat::Plain, &ack, session).unwrap();
        assert_eq!(out, "Session too short, not recorded");
    }

    #[test]
    fn test_behavior_without_sessions() {
        let out = behavior(&StudyBehavior::default());
        assert!(out.contains("Preferred hour: -"));
    }

    #[test]
    fn test_word_detail() {
        let out = word_detail(&word());
        assert!(out.contains("next new"));
        assert!(out.contains("example: A candid answer."));
        assert_eq!(words(&Vec::new()), "(no words)");
    }
}
