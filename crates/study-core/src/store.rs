//! Storage contracts.
//!
//! Every call is scoped to one user. Implementations report a word that is
//! missing or owned by someone else as [`StoreError::NotFound`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ReviewRecord, StudySession, StudyStats, Word, WordId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Word entities keyed by owner.
pub trait WordRepository: Send + Sync {
    /// All words of a user, most recently updated first, optionally
    /// filtered by a case-insensitive term substring.
    fn list_words(&self, owner: &str, query: Option<&str>) -> StoreResult<Vec<Word>>;

    /// Reviewed words scheduled at or before `now`, oldest schedule first.
    fn due_words(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<Vec<Word>>;

    fn get_word(&self, owner: &str, id: WordId) -> StoreResult<Option<Word>>;

    fn insert_word(&self, word: &Word) -> StoreResult<()>;

    /// Insert all words or none.
    fn insert_words(&self, words: &[Word]) -> StoreResult<()>;

    /// Overwrite a stored word; `NotFound` unless `word.owner` owns it.
    fn update_word(&self, word: &Word) -> StoreResult<()>;

    /// Save a reviewed word and append its log entry, both or neither.
    fn apply_review(&self, word: &Word, record: &ReviewRecord) -> StoreResult<()>;

    /// Hard delete, together with the word's review history.
    fn delete_word(&self, owner: &str, id: WordId) -> StoreResult<()>;

    fn count_words(&self, owner: &str) -> StoreResult<usize>;

    fn count_due(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<usize>;
}

/// Append-only log of answered words.
pub trait ReviewLog: Send + Sync {
    fn append_review(&self, record: &ReviewRecord) -> StoreResult<()>;

    /// Reviews with `start <= reviewed_at < end`.
    fn count_reviews_between(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<usize>;

    /// Distinct words answered wrong at least once, latest mistake first.
    fn incorrect_word_ids(&self, owner: &str) -> StoreResult<Vec<WordId>>;
}

/// Append-only study sessions.
pub trait SessionStore: Send + Sync {
    fn append_session(&self, session: &StudySession) -> StoreResult<()>;

    /// Sessions started in the seven days up to `now`.
    fn sessions_last_7_days(&self, owner: &str, now: DateTime<Utc>)
        -> StoreResult<Vec<StudySession>>;
}

/// Persisted day and streak aggregates. `today_count` is not stored.
pub trait StatsStore: Send + Sync {
    fn read_stats(&self, owner: &str) -> StoreResult<Option<StudyStats>>;

    fn write_stats(&self, owner: &str, stats: &StudyStats) -> StoreResult<()>;
}
