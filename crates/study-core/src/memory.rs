//! In-memory store, for tests and embedding without a database.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};

use crate::models::{ReviewRecord, StudySession, StudyStats, UserId, Word, WordId};
use crate::store::{
    ReviewLog, SessionStore, StatsStore, StoreError, StoreResult, WordRepository,
};

#[derive(Default)]
struct State {
    words: HashMap<WordId, Word>,
    reviews: Vec<ReviewRecord>,
    sessions: Vec<StudySession>,
    stats: HashMap<UserId, StudyStats>,
}

/// Keeps everything in process memory behind a lock.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

fn not_found(id: WordId) -> StoreError {
    StoreError::NotFound(format!("word {id}"))
}

fn duplicate_review(record: &ReviewRecord) -> StoreError {
    StoreError::Unavailable(format!("duplicate review id {}", record.id))
}

impl WordRepository for MemoryStore {
    fn list_words(&self, owner: &str, query: Option<&str>) -> StoreResult<Vec<Word>> {
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let state = self.read()?;
        let mut words: Vec<Word> = state
            .words
            .values()
            .filter(|w| w.owner == owner)
            .filter(|w| match &needle {
                Some(n) => w.term.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect();
        words.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(words)
    }

    fn due_words(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<Vec<Word>> {
        let state = self.read()?;
        let mut words: Vec<Word> = state
            .words
            .values()
            .filter(|w| w.owner == owner && w.is_due(now))
            .cloned()
            .collect();
        words.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(words)
    }

    fn get_word(&self, owner: &str, id: WordId) -> StoreResult<Option<Word>> {
        let state = self.read()?;
        Ok(state.words.get(&id).filter(|w| w.owner == owner).cloned())
    }

    fn insert_word(&self, word: &Word) -> StoreResult<()> {
        self.insert_words(std::slice::from_ref(word))
    }

    fn insert_words(&self, words: &[Word]) -> StoreResult<()> {
        let mut state = self.write()?;
        if let Some(dup) = words.iter().find(|w| state.words.contains_key(&w.id)) {
            return Err(StoreError::Unavailable(format!("duplicate word id {}", dup.id)));
        }
        for word in words {
            state.words.insert(word.id, word.clone());
        }
        Ok(())
    }

    fn update_word(&self, word: &Word) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.words.get_mut(&word.id) {
            Some(stored) if stored.owner == word.owner => {
                *stored = word.clone();
                Ok(())
            }
            _ => Err(not_found(word.id)),
        }
    }

    fn apply_review(&self, word: &Word, record: &ReviewRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.reviews.iter().any(|r| r.id == record.id) {
            return Err(duplicate_review(record));
        }
        match state.words.get_mut(&word.id) {
            Some(stored) if stored.owner == word.owner => *stored = word.clone(),
            _ => return Err(not_found(word.id)),
        }
        state.reviews.push(record.clone());
        Ok(())
    }

    fn delete_word(&self, owner: &str, id: WordId) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.words.get(&id) {
            Some(w) if w.owner == owner => {
                state.words.remove(&id);
                state.reviews.retain(|r| r.word_id != id);
                Ok(())
            }
            _ => Err(not_found(id)),
        }
    }

    fn count_words(&self, owner: &str) -> StoreResult<usize> {
        let state = self.read()?;
        Ok(state.words.values().filter(|w| w.owner == owner).count())
    }

    fn count_due(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<usize> {
        let state = self.read()?;
        Ok(state
            .words
            .values()
            .filter(|w| w.owner == owner && w.is_due(now))
            .count())
    }
}

impl ReviewLog for MemoryStore {
    fn append_review(&self, record: &ReviewRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.reviews.iter().any(|r| r.id == record.id) {
            return Err(duplicate_review(record));
        }
        state.reviews.push(record.clone());
        Ok(())
    }

    fn count_reviews_between(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<usize> {
        let state = self.read()?;
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.owner == owner && r.reviewed_at >= start && r.reviewed_at < end)
            .count())
    }

    fn incorrect_word_ids(&self, owner: &str) -> StoreResult<Vec<WordId>> {
        let state = self.read()?;
        let mut mistakes: Vec<&ReviewRecord> = state
            .reviews
            .iter()
            .filter(|r| r.owner == owner && !r.correct)
            .collect();
        mistakes.sort_by(|a, b| b.reviewed_at.cmp(&a.reviewed_at));

        let mut ids = Vec::new();
        for record in mistakes {
            if !ids.contains(&record.word_id) {
                ids.push(record.word_id);
            }
        }
        Ok(ids)
    }
}

impl SessionStore for MemoryStore {
    fn append_session(&self, session: &StudySession) -> StoreResult<()> {
        self.write()?.sessions.push(session.clone());
        Ok(())
    }

    fn sessions_last_7_days(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<StudySession>> {
        let since = now - Duration::days(7);
        let state = self.read()?;
        let mut sessions: Vec<StudySession> = state
            .sessions
            .iter()
            .filter(|s| s.owner == owner && s.started_at > since && s.started_at <= now)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }
}

impl StatsStore for MemoryStore {
    fn read_stats(&self, owner: &str) -> StoreResult<Option<StudyStats>> {
        let state = self.read()?;
        Ok(state.stats.get(owner).cloned().map(|mut stats| {
            stats.today_count = 0;
            stats
        }))
    }

    fn write_stats(&self, owner: &str, stats: &StudyStats) -> StoreResult<()> {
        self.write()?.stats.insert(owner.to_string(), stats.clone());
        Ok(())
    }
}
