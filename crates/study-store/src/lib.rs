//! SQLite persistence for the study engine.
//!
//! [`Database`] implements every storage trait from `study_core`, so a
//! single handle backs a whole [`study_core::StudyService`].

mod db;

use chrono::{DateTime, Utc};
use study_core::{
    ReviewLog, ReviewRecord, SessionStore, StatsStore, StoreError, StoreResult, StudySession,
    StudyStats, Word, WordId, WordRepository,
};

pub use db::{Database, DbError, DbResult};

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => StoreError::NotFound(what),
            DbError::Poisoned => StoreError::Unavailable("database connection lock poisoned".into()),
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

impl WordRepository for Database {
    fn list_words(&self, owner: &str, query: Option<&str>) -> StoreResult<Vec<Word>> {
        Ok(Database::list_words(self, owner, query)?)
    }

    fn due_words(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<Vec<Word>> {
        Ok(self.get_due_words(owner, now)?)
    }

    fn get_word(&self, owner: &str, id: WordId) -> StoreResult<Option<Word>> {
        Ok(Database::get_word(self, owner, id)?)
    }

    fn insert_word(&self, word: &Word) -> StoreResult<()> {
        Ok(Database::insert_word(self, word)?)
    }

    fn insert_words(&self, words: &[Word]) -> StoreResult<()> {
        Ok(Database::insert_words(self, words)?)
    }

    fn update_word(&self, word: &Word) -> StoreResult<()> {
        Ok(Database::update_word(self, word)?)
    }

    fn apply_review(&self, word: &Word, record: &ReviewRecord) -> StoreResult<()> {
        Ok(Database::apply_review(self, word, record)?)
    }

    fn delete_word(&self, owner: &str, id: WordId) -> StoreResult<()> {
        Ok(Database::delete_word(self, owner, id)?)
    }

    fn count_words(&self, owner: &str) -> StoreResult<usize> {
        Ok(Database::count_words(self, owner)?)
    }

    fn count_due(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<usize> {
        Ok(Database::count_due(self, owner, now)?)
    }
}

impl ReviewLog for Database {
    fn append_review(&self, record: &ReviewRecord) -> StoreResult<()> {
        Ok(self.insert_review(record)?)
    }

    fn count_reviews_between(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<usize> {
        Ok(self.count_reviews(owner, start, end)?)
    }

    fn incorrect_word_ids(&self, owner: &str) -> StoreResult<Vec<WordId>> {
        Ok(self.get_incorrect_word_ids(owner)?)
    }
}

impl SessionStore for Database {
    fn append_session(&self, session: &StudySession) -> StoreResult<()> {
        Ok(self.insert_session(session)?)
    }

    fn sessions_last_7_days(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<StudySession>> {
        Ok(self.get_recent_sessions(owner, now)?)
    }
}

impl StatsStore for Database {
    fn read_stats(&self, owner: &str) -> StoreResult<Option<StudyStats>> {
        Ok(self.get_stats(owner)?)
    }

    fn write_stats(&self, owner: &str, stats: &StudyStats) -> StoreResult<()> {
        Ok(self.upsert_stats(owner, stats)?)
    }
}
