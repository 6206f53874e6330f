//! Data models for word study.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::StudyCalendar;
use crate::error::{StudyError, StudyResult};

/// Unique identifiers.
pub type UserId = String;
pub type WordId = Uuid;
pub type ReviewId = Uuid;
pub type SessionId = Uuid;

/// Highest familiarity level a word can reach.
pub const MAX_FAMILIARITY: u8 = 5;

/// Content fields of a word, as supplied by an add, edit or import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordDraft {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub meanings: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub word_root: Option<String>,
    #[serde(default)]
    pub similar_words: Vec<String>,
    #[serde(default)]
    pub exam_tag: Option<String>,
}

impl WordDraft {
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
            ..Self::default()
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn with_meaning(mut self, meaning: impl Into<String>) -> Self {
        self.meanings.push(meaning.into());
        self
    }

    pub fn with_word_root(mut self, root: impl Into<String>) -> Self {
        self.word_root = Some(root.into());
        self
    }

    pub fn with_similar(mut self, word: impl Into<String>) -> Self {
        self.similar_words.push(word.into());
        self
    }

    pub fn with_exam_tag(mut self, tag: impl Into<String>) -> Self {
        self.exam_tag = Some(tag.into());
        self
    }

    /// Term and definition must carry text once trimmed.
    pub fn validate(&self) -> StudyResult<()> {
        if self.term.trim().is_empty() {
            return Err(StudyError::InvalidInput("term must not be blank".into()));
        }
        if self.definition.trim().is_empty() {
            return Err(StudyError::InvalidInput("definition must not be blank".into()));
        }
        Ok(())
    }

    fn trimmed(self) -> Self {
        let clean = |s: Option<String>| {
            s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        let clean_list = |v: Vec<String>| {
            v.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            term: self.term.trim().to_string(),
            definition: self.definition.trim().to_string(),
            meanings: clean_list(self.meanings),
            examples: clean_list(self.examples),
            word_root: clean(self.word_root),
            similar_words: clean_list(self.similar_words),
            exam_tag: clean(self.exam_tag),
        }
    }
}

/// A vocabulary entry owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub owner: UserId,
    pub term: String,
    pub definition: String,
    pub meanings: Vec<String>,
    pub examples: Vec<String>,
    pub word_root: Option<String>,
    pub similar_words: Vec<String>,
    pub exam_tag: Option<String>,
    /// 0..=5, raised by correct answers and lowered by wrong ones.
    pub familiarity: u8,
    /// `None` until the first review.
    pub next_review_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Word {
    /// Create a never-reviewed word from a draft.
    pub fn new(owner: impl Into<UserId>, draft: WordDraft, now: DateTime<Utc>) -> Self {
        let draft = draft.trimmed();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            term: draft.term,
            definition: draft.definition,
            meanings: draft.meanings,
            examples: draft.examples,
            word_root: draft.word_root,
            similar_words: draft.similar_words,
            exam_tag: draft.exam_tag,
            familiarity: 0,
            next_review_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the content fields; scheduling state is left alone.
    pub fn apply_draft(&mut self, draft: WordDraft, now: DateTime<Utc>) {
        let draft = draft.trimmed();
        self.term = draft.term;
        self.definition = draft.definition;
        self.meanings = draft.meanings;
        self.examples = draft.examples;
        self.word_root = draft.word_root;
        self.similar_words = draft.similar_words;
        self.exam_tag = draft.exam_tag;
        self.updated_at = now;
    }

    /// First example sentence, if any.
    pub fn example(&self) -> Option<&str> {
        self.examples.first().map(String::as_str)
    }

    pub fn has_review_history(&self) -> bool {
        self.next_review_at.is_some()
    }

    /// Reviewed before and scheduled at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.next_review_at, Some(at) if at <= now)
    }

    /// Eligible for the "new" share of a plan.
    ///
    /// A word is new while it has never been reviewed. With a cutoff, only
    /// never-reviewed words created at or after it qualify, so a fresh import
    /// can be studied without resurfacing the older backlog.
    pub fn is_new(&self, imported_after: Option<DateTime<Utc>>) -> bool {
        if self.has_review_history() {
            return false;
        }
        match imported_after {
            Some(cutoff) => self.created_at >= cutoff,
            None => true,
        }
    }
}

/// One answered word. Consumed by the scheduler, never stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub word_id: WordId,
    pub correct: bool,
    pub at: DateTime<Utc>,
}

/// A review entry in the log that backs today's count and the mistake list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewId,
    pub owner: UserId,
    pub word_id: WordId,
    pub correct: bool,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn new(owner: impl Into<UserId>, outcome: &ReviewOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            word_id: outcome.word_id,
            correct: outcome.correct,
            reviewed_at: outcome.at,
        }
    }
}

/// A recorded practice interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: SessionId,
    pub owner: UserId,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u32,
}

impl StudySession {
    pub fn new(owner: impl Into<UserId>, started_at: DateTime<Utc>, duration_seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            started_at,
            duration_seconds,
        }
    }
}

/// Day-level study aggregates for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyStats {
    /// Distinct calendar days with study.
    pub total_days: u32,
    /// Consecutive study days ending today or yesterday.
    pub streak_days: u32,
    pub last_study_date: Option<NaiveDate>,
    /// Reviews completed today. Derived from the review log, never stored.
    pub today_count: u32,
}

/// Session-derived habits over the trailing week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyBehavior {
    pub avg_duration_minutes: u32,
    /// Hour of day (0..=23), or -1 without sessions.
    pub preferred_hour: i8,
    pub focus_score: u8,
    pub consistency_score: u8,
    pub sessions_last_7_days: u32,
    pub today_minutes: u32,
}

impl Default for StudyBehavior {
    fn default() -> Self {
        Self {
            avg_duration_minutes: 0,
            preferred_hour: -1,
            focus_score: 0,
            consistency_score: 0,
            sessions_last_7_days: 0,
            today_minutes: 0,
        }
    }
}

/// Parameters of a "today's plan" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub daily_target: u32,
    /// Percentage of the plan drawn from new words.
    pub new_word_ratio: u32,
    pub imported_after: Option<DateTime<Utc>>,
}

impl PlanRequest {
    pub const MIN_DAILY_TARGET: u32 = 5;
    pub const MAX_DAILY_TARGET: u32 = 200;
    pub const MAX_NEW_WORD_RATIO: u32 = 100;

    pub fn new(daily_target: u32, new_word_ratio: u32) -> Self {
        Self {
            daily_target,
            new_word_ratio,
            imported_after: None,
        }
    }

    /// Build a request with both numbers pulled into their allowed ranges.
    pub fn clamped(daily_target: u32, new_word_ratio: u32) -> Self {
        Self::new(
            daily_target.clamp(Self::MIN_DAILY_TARGET, Self::MAX_DAILY_TARGET),
            new_word_ratio.min(Self::MAX_NEW_WORD_RATIO),
        )
    }

    pub fn imported_after(mut self, cutoff: DateTime<Utc>) -> Self {
        self.imported_after = Some(cutoff);
        self
    }

    pub fn validate(&self) -> StudyResult<()> {
        if !(Self::MIN_DAILY_TARGET..=Self::MAX_DAILY_TARGET).contains(&self.daily_target) {
            return Err(StudyError::InvalidInput(format!(
                "daily target {} outside {}..={}",
                self.daily_target,
                Self::MIN_DAILY_TARGET,
                Self::MAX_DAILY_TARGET
            )));
        }
        if self.new_word_ratio > Self::MAX_NEW_WORD_RATIO {
            return Err(StudyError::InvalidInput(format!(
                "new word ratio {} above {}",
                self.new_word_ratio,
                Self::MAX_NEW_WORD_RATIO
            )));
        }
        Ok(())
    }
}

/// Words to study today, due reviews first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayPlan {
    pub words: Vec<Word>,
    /// Reviews already completed today, not the plan length.
    pub today_count: u32,
}

/// Dashboard summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub stats: StudyStats,
    pub word_count: usize,
    pub due_count: usize,
}

/// Result of a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// What happened to a submitted session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAck {
    /// Stored.
    Recorded,
    /// Shorter than the minimum, treated as an accidental open.
    TooShort,
    /// The session store failed; analytics only, so nothing else is affected.
    Dropped,
}

/// Service-level study settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyPolicy {
    /// Shrink today's quota by reviews already done today.
    pub count_completed_toward_target: bool,
    /// Scale the daily target by recent session length.
    pub adaptive_target: bool,
    /// Sessions shorter than this are not recorded.
    pub min_session_seconds: u32,
    /// Where calendar days start and end.
    pub calendar: StudyCalendar,
}

impl Default for StudyPolicy {
    fn default() -> Self {
        Self {
            count_completed_toward_target: true,
            adaptive_target: false,
            min_session_seconds: 10,
            calendar: StudyCalendar::utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_word_creation_trims_content() {
        let draft = WordDraft::new("  abandon ", " to leave behind ")
            .with_example("  ")
            .with_example("They abandoned the car.")
            .with_word_root(" ");
        let word = Word::new("alice", draft, at(8));

        assert_eq!(word.term, "abandon");
        assert_eq!(word.definition, "to leave behind");
        assert_eq!(word.examples, vec!["They abandoned the car.".to_string()]);
        assert_eq!(word.example(), Some("They abandoned the car."));
        assert_eq!(word.word_root, None);
        assert_eq!(word.familiarity, 0);
        assert!(word.next_review_at.is_none());
        assert_eq!(word.created_at, word.updated_at);
    }

    #[test]
    fn test_draft_validation() {
        assert!(WordDraft::new("cat", "a small feline").validate().is_ok());
        assert!(matches!(
            WordDraft::new(" ", "x").validate(),
            Err(StudyError::InvalidInput(_))
        ));
        assert!(matches!(
            WordDraft::new("cat", "").validate(),
            Err(StudyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_apply_draft_keeps_schedule() {
        let mut word = Word::new("alice", WordDraft::new("cat", "feline"), at(8));
        word.familiarity = 3;
        word.next_review_at = Some(at(20));

        word.apply_draft(WordDraft::new("cat", "small feline").with_exam_tag("CET4"), at(9));

        assert_eq!(word.definition, "small feline");
        assert_eq!(word.exam_tag.as_deref(), Some("CET4"));
        assert_eq!(word.familiarity, 3);
        assert_eq!(word.next_review_at, Some(at(20)));
        assert_eq!(word.updated_at, at(9));
    }

    #[test]
    fn test_due_and_new_predicates() {
        let mut word = Word::new("alice", WordDraft::new("cat", "feline"), at(8));
        assert!(!word.is_due(at(9)));
        assert!(word.is_new(None));
        assert!(word.is_new(Some(at(8))));
        assert!(!word.is_new(Some(at(8) + Duration::seconds(1))));

        word.next_review_at = Some(at(10));
        assert!(!word.is_new(None));
        assert!(!word.is_due(at(9)));
        assert!(word.is_due(at(10)));
    }

    #[test]
    fn test_plan_request_bounds() {
        assert!(PlanRequest::new(20, 30).validate().is_ok());
        assert!(PlanRequest::new(5, 0).validate().is_ok());
        assert!(PlanRequest::new(200, 100).validate().is_ok());
        assert!(PlanRequest::new(4, 30).validate().is_err());
        assert!(PlanRequest::new(201, 30).validate().is_err());
        assert!(PlanRequest::new(20, 101).validate().is_err());

        let clamped = PlanRequest::clamped(1000, 150);
        assert_eq!(clamped.daily_target, 200);
        assert_eq!(clamped.new_word_ratio, 100);
        assert!(clamped.validate().is_ok());
    }

    #[test]
    fn test_behavior_default_has_no_preferred_hour() {
        let behavior = StudyBehavior::default();
        assert_eq!(behavior.preferred_hour, -1);
        assert_eq!(behavior.sessions_last_7_days, 0);
    }
}
