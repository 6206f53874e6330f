//! The operations exposed to the serving layer.
//!
//! `StudyService` ties the scheduler, the plan selector, the stats tracker
//! and the behavior analyzer to the stores. Every method is scoped to one
//! user and takes the current time explicitly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::algorithm::{get_scheduler, ReviewScheduler};
use crate::behavior::{adaptive_target, compute_behavior};
use crate::error::{StudyError, StudyResult};
use crate::models::{
    ImportSummary, Overview, PlanRequest, ReviewOutcome, ReviewRecord, SessionAck, StudyBehavior,
    StudyPolicy, StudySession, StudyStats, TodayPlan, UserId, Word, WordDraft, WordId,
};
use crate::plan::select_with_quota;
use crate::stats::record_study_day;
use crate::store::{ReviewLog, SessionStore, StatsStore, WordRepository};

pub struct StudyService {
    words: Arc<dyn WordRepository>,
    reviews: Arc<dyn ReviewLog>,
    sessions: Arc<dyn SessionStore>,
    stats: Arc<dyn StatsStore>,
    scheduler: Box<dyn ReviewScheduler>,
    policy: StudyPolicy,
    user_locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl StudyService {
    /// Build a service over one store that serves every contract.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: WordRepository + ReviewLog + SessionStore + StatsStore + 'static,
    {
        Self {
            words: store.clone(),
            reviews: store.clone(),
            sessions: store.clone(),
            stats: store,
            scheduler: get_scheduler("ladder"),
            policy: StudyPolicy::default(),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Box<dyn ReviewScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_policy(mut self, policy: StudyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Route sessions to a separate store.
    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn scheduler(&self) -> &dyn ReviewScheduler {
        self.scheduler.as_ref()
    }

    pub fn policy(&self) -> &StudyPolicy {
        &self.policy
    }

    // Word operations

    pub fn add_word(&self, user: &str, draft: WordDraft, now: DateTime<Utc>) -> StudyResult<Word> {
        draft.validate()?;
        let word = Word::new(user, draft, now);
        self.words.insert_word(&word)?;
        debug!(user, id = %word.id, term = %word.term, "word added");
        Ok(word)
    }

    /// Bulk add. Drafts with a blank term or definition are skipped.
    pub fn import_words(
        &self,
        user: &str,
        drafts: Vec<WordDraft>,
        now: DateTime<Utc>,
    ) -> StudyResult<ImportSummary> {
        let total = drafts.len();
        let words: Vec<Word> = drafts
            .into_iter()
            .filter(|d| d.validate().is_ok())
            .map(|d| Word::new(user, d, now))
            .collect();
        if !words.is_empty() {
            self.words.insert_words(&words)?;
        }
        let summary = ImportSummary {
            imported: words.len(),
            skipped: total - words.len(),
        };
        info!(user, imported = summary.imported, skipped = summary.skipped, "words imported");
        Ok(summary)
    }

    pub fn edit_word(
        &self,
        user: &str,
        id: WordId,
        draft: WordDraft,
        now: DateTime<Utc>,
    ) -> StudyResult<Word> {
        draft.validate()?;
        let lock = self.user_lock(user);
        let _guard = hold(&lock);

        let mut word = self.owned_word(user, id)?;
        word.apply_draft(draft, now);
        self.words.update_word(&word)?;
        Ok(word)
    }

    pub fn delete_word(&self, user: &str, id: WordId) -> StudyResult<()> {
        let lock = self.user_lock(user);
        let _guard = hold(&lock);
        self.words.delete_word(user, id)?;
        debug!(user, %id, "word deleted");
        Ok(())
    }

    pub fn get_word(&self, user: &str, id: WordId) -> StudyResult<Word> {
        self.owned_word(user, id)
    }

    pub fn list_words(&self, user: &str, query: Option<&str>) -> StudyResult<Vec<Word>> {
        Ok(self.words.list_words(user, query)?)
    }

    pub fn due_words(&self, user: &str, now: DateTime<Utc>) -> StudyResult<Vec<Word>> {
        Ok(self.words.due_words(user, now)?)
    }

    /// Words answered wrong at least once, latest mistake first.
    pub fn incorrect_words(&self, user: &str) -> StudyResult<Vec<Word>> {
        let ids = self.reviews.incorrect_word_ids(user)?;
        let mut words = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(word) = self.words.get_word(user, id)? {
                words.push(word);
            }
        }
        Ok(words)
    }

    // Review

    /// Apply one answer and persist the new schedule.
    ///
    /// Answers for the same user are applied one at a time, each against a
    /// fresh read, so racing submissions cannot both start from the same
    /// familiarity.
    pub fn apply_outcome(
        &self,
        user: &str,
        id: WordId,
        correct: bool,
        now: DateTime<Utc>,
    ) -> StudyResult<Word> {
        let lock = self.user_lock(user);
        let _guard = hold(&lock);

        let word = self.owned_word(user, id)?;
        let outcome = ReviewOutcome {
            word_id: id,
            correct,
            at: now,
        };
        let updated = self.scheduler.apply_outcome(&word, outcome.correct, outcome.at);
        self.words
            .apply_review(&updated, &ReviewRecord::new(user, &outcome))?;

        debug!(
            user,
            %id,
            correct,
            from = word.familiarity,
            to = updated.familiarity,
            "review applied"
        );
        Ok(updated)
    }

    // Plan and stats

    /// Today's ordered study list and the reviews already done today.
    pub fn today_plan(
        &self,
        user: &str,
        request: &PlanRequest,
        now: DateTime<Utc>,
    ) -> StudyResult<TodayPlan> {
        request.validate()?;
        let today_count = self.today_count(user, now)?;

        let mut target = request.daily_target;
        if self.policy.adaptive_target {
            match self.behavior(user, now) {
                Ok(behavior) => target = adaptive_target(target, &behavior),
                Err(err) => {
                    warn!(user, error = %err, "session history unavailable, target unadjusted");
                }
            }
        }
        let quota = if self.policy.count_completed_toward_target {
            target.saturating_sub(today_count)
        } else {
            target
        };
        if quota == 0 {
            return Ok(TodayPlan {
                words: Vec::new(),
                today_count,
            });
        }

        let all = self.words.list_words(user, None)?;
        let due = self.words.due_words(user, now)?;
        let words = select_with_quota(&all, &due, now, request, quota as usize)?;
        Ok(TodayPlan { words, today_count })
    }

    /// Stats as of `now`, with today's count from the review log.
    pub fn stats(&self, user: &str, now: DateTime<Utc>) -> StudyResult<StudyStats> {
        let stored = self.stats.read_stats(user)?.unwrap_or_default();
        let mut stats = stored.as_of(self.policy.calendar.day_of(now));
        stats.today_count = self.today_count(user, now)?;
        Ok(stats)
    }

    /// Mark today as a study day.
    pub fn record_study(&self, user: &str, now: DateTime<Utc>) -> StudyResult<StudyStats> {
        {
            let lock = self.user_lock(user);
            let _guard = hold(&lock);

            let today = self.policy.calendar.day_of(now);
            let previous = self.stats.read_stats(user)?.unwrap_or_default();
            let updated = record_study_day(&previous, today);
            if updated != previous {
                self.stats.write_stats(user, &updated)?;
            }
        }
        self.stats(user, now)
    }

    pub fn overview(&self, user: &str, now: DateTime<Utc>) -> StudyResult<Overview> {
        Ok(Overview {
            stats: self.stats(user, now)?,
            word_count: self.words.count_words(user)?,
            due_count: self.words.count_due(user, now)?,
        })
    }

    // Sessions

    pub fn behavior(&self, user: &str, now: DateTime<Utc>) -> StudyResult<StudyBehavior> {
        let sessions = self.sessions.sessions_last_7_days(user, now)?;
        Ok(compute_behavior(&sessions, now, &self.policy.calendar))
    }

    /// Best-effort: a failing session store is logged and reported as
    /// [`SessionAck::Dropped`], never as an error.
    pub fn record_session(
        &self,
        user: &str,
        started_at: DateTime<Utc>,
        duration_seconds: u32,
    ) -> SessionAck {
        if duration_seconds < self.policy.min_session_seconds {
            debug!(user, duration_seconds, "session too short, not recorded");
            return SessionAck::TooShort;
        }
        let session = StudySession::new(user, started_at, duration_seconds);
        match self.sessions.append_session(&session) {
            Ok(()) => SessionAck::Recorded,
            Err(err) => {
                warn!(user, error = %err, "failed to record study session");
                SessionAck::Dropped
            }
        }
    }

    fn today_count(&self, user: &str, now: DateTime<Utc>) -> StudyResult<u32> {
        let (start, end) = self.policy.calendar.day_bounds(now);
        let count = self.reviews.count_reviews_between(user, start, end)?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn owned_word(&self, user: &str, id: WordId) -> StudyResult<Word> {
        self.words
            .get_word(user, id)?
            .ok_or_else(|| StudyError::NotFound(format!("word {id}")))
    }

    /// Lock entries nobody else holds are dropped here, so the map only
    /// grows with the number of users active at the same time.
    fn user_lock(&self, user: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(user.to_string()).or_default().clone()
    }
}

/// The guarded value is `()`, so a poisoned lock carries no broken state.
fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{StoreError, StoreResult};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()
    }

    fn service() -> StudyService {
        StudyService::new(Arc::new(MemoryStore::new()))
    }

    fn seed(service: &StudyService, user: &str, n: usize, at: DateTime<Utc>) -> Vec<Word> {
        (0..n)
            .map(|i| {
                service
                    .add_word(user, WordDraft::new(format!("w{i}"), "def"), at + Duration::seconds(i as i64))
                    .unwrap()
            })
            .collect()
    }

    struct BrokenSessions;

    impl SessionStore for BrokenSessions {
        fn append_session(&self, _session: &StudySession) -> StoreResult<()> {
            Err(StoreError::Unavailable("session db down".into()))
        }

        fn sessions_last_7_days(
            &self,
            _owner: &str,
            _now: DateTime<Utc>,
        ) -> StoreResult<Vec<StudySession>> {
            Err(StoreError::Unavailable("session db down".into()))
        }
    }

    /// Memory store whose review log goes down on demand.
    #[derive(Default)]
    struct FlakyLog {
        inner: MemoryStore,
        down: AtomicBool,
    }

    impl FlakyLog {
        fn check(&self) -> StoreResult<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("log down".into()));
            }
            Ok(())
        }
    }

    impl WordRepository for FlakyLog {
        fn list_words(&self, owner: &str, query: Option<&str>) -> StoreResult<Vec<Word>> {
            self.inner.list_words(owner, query)
        }

        fn due_words(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<Vec<Word>> {
            self.inner.due_words(owner, now)
        }

        fn get_word(&self, owner: &str, id: WordId) -> StoreResult<Option<Word>> {
            self.inner.get_word(owner, id)
        }

        fn insert_word(&self, word: &Word) -> StoreResult<()> {
            self.inner.insert_word(word)
        }

        fn insert_words(&self, words: &[Word]) -> StoreResult<()> {
            self.inner.insert_words(words)
        }

        fn update_word(&self, word: &Word) -> StoreResult<()> {
            self.inner.update_word(word)
        }

        fn apply_review(&self, word: &Word, record: &ReviewRecord) -> StoreResult<()> {
            self.check()?;
            self.inner.apply_review(word, record)
        }

        fn delete_word(&self, owner: &str, id: WordId) -> StoreResult<()> {
            self.inner.delete_word(owner, id)
        }

        fn count_words(&self, owner: &str) -> StoreResult<usize> {
            self.inner.count_words(owner)
        }

        fn count_due(&self, owner: &str, now: DateTime<Utc>) -> StoreResult<usize> {
            self.inner.count_due(owner, now)
        }
    }

    impl ReviewLog for FlakyLog {
        fn append_review(&self, record: &ReviewRecord) -> StoreResult<()> {
            self.check()?;
            self.inner.append_review(record)
        }

        fn count_reviews_between(
            &self,
            owner: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> StoreResult<usize> {
            self.inner.count_reviews_between(owner, start, end)
        }

        fn incorrect_word_ids(&self, owner: &str) -> StoreResult<Vec<WordId>> {
            self.inner.incorrect_word_ids(owner)
        }
    }

    impl SessionStore for FlakyLog {
        fn append_session(&self, session: &StudySession) -> StoreResult<()> {
            self.inner.append_session(session)
        }

        fn sessions_last_7_days(
            &self,
            owner: &str,
            now: DateTime<Utc>,
        ) -> StoreResult<Vec<StudySession>> {
            self.inner.sessions_last_7_days(owner, now)
        }
    }

    impl StatsStore for FlakyLog {
        fn read_stats(&self, owner: &str) -> StoreResult<Option<StudyStats>> {
            self.inner.read_stats(owner)
        }

        fn write_stats(&self, owner: &str, stats: &StudyStats) -> StoreResult<()> {
            self.inner.write_stats(owner, stats)
        }
    }

    #[test]
    fn test_add_rejects_blank_term() {
        let err = service()
            .add_word("alice", WordDraft::new("  ", "def"), t0())
            .unwrap_err();
        assert!(matches!(err, StudyError::InvalidInput(_)));
    }

    #[test]
    fn test_apply_outcome_updates_schedule() {
        let service = service();
        let word = seed(&service, "alice", 1, t0()).remove(0);
        let now = t0() + Duration::hours(1);

        let updated = service.apply_outcome("alice", word.id, true, now).unwrap();
        assert_eq!(updated.familiarity, 1);
        assert_eq!(
            updated.next_review_at,
            Some(now + service.scheduler().interval_for(1))
        );
        assert_eq!(service.get_word("alice", word.id).unwrap(), updated);
        assert_eq!(service.stats("alice", now).unwrap().today_count, 1);
    }

    #[test]
    fn test_apply_outcome_for_other_user_is_not_found() {
        let service = service();
        let word = seed(&service, "alice", 1, t0()).remove(0);
        let err = service.apply_outcome("bob", word.id, true, t0()).unwrap_err();
        assert!(matches!(err, StudyError::NotFound(_)));
        assert_eq!(service.get_word("alice", word.id).unwrap().familiarity, 0);
    }

    #[test]
    fn test_edit_and_delete_scoped_to_owner() {
        let service = service();
        let word = seed(&service, "alice", 1, t0()).remove(0);

        let err = service
            .edit_word("bob", word.id, WordDraft::new("x", "y"), t0())
            .unwrap_err();
        assert!(matches!(err, StudyError::NotFound(_)));
        assert!(matches!(
            service.delete_word("bob", word.id),
            Err(StudyError::NotFound(_))
        ));

        let edited = service
            .edit_word("alice", word.id, WordDraft::new("w0", "new def"), t0())
            .unwrap();
        assert_eq!(edited.definition, "new def");
        service.delete_word("alice", word.id).unwrap();
        assert!(service.list_words("alice", None).unwrap().is_empty());
    }

    #[test]
    fn test_import_skips_blank_drafts() {
        let service = service();
        let drafts = vec![
            WordDraft::new("cat", "feline"),
            WordDraft::new("", "nothing"),
            WordDraft::new("dog", "canine"),
        ];
        let summary = service.import_words("alice", drafts, t0()).unwrap();
        assert_eq!(summary, ImportSummary { imported: 2, skipped: 1 });
        assert_eq!(service.list_words("alice", None).unwrap().len(), 2);
    }

    #[test]
    fn test_today_plan_subtracts_completed_reviews() {
        let service = service();
        let words = seed(&service, "alice", 30, t0() - Duration::days(3));
        for word in &words[..4] {
            service.apply_outcome("alice", word.id, true, t0()).unwrap();
        }

        let plan = service
            .today_plan("alice", &PlanRequest::new(10, 50), t0())
            .unwrap();
        assert_eq!(plan.today_count, 4);
        assert_eq!(plan.words.len(), 6);
    }

    #[test]
    fn test_today_plan_empty_when_target_met() {
        let service = service();
        let words = seed(&service, "alice", 8, t0() - Duration::days(3));
        for word in &words[..5] {
            service.apply_outcome("alice", word.id, false, t0()).unwrap();
        }
        let plan = service
            .today_plan("alice", &PlanRequest::new(5, 50), t0())
            .unwrap();
        assert!(plan.words.is_empty());
        assert_eq!(plan.today_count, 5);
    }

    #[test]
    fn test_today_plan_full_target_when_not_counting_completed() {
        let policy = StudyPolicy {
            count_completed_toward_target: false,
            ..StudyPolicy::default()
        };
        let service = service().with_policy(policy);
        let words = seed(&service, "alice", 30, t0() - Duration::days(3));
        service.apply_outcome("alice", words[0].id, true, t0()).unwrap();

        let plan = service
            .today_plan("alice", &PlanRequest::new(10, 50), t0())
            .unwrap();
        assert_eq!(plan.words.len(), 10);
        assert_eq!(plan.today_count, 1);
    }

    #[test]
    fn test_today_plan_rejects_out_of_range() {
        let err = service()
            .today_plan("alice", &PlanRequest::new(500, 50), t0())
            .unwrap_err();
        assert!(matches!(err, StudyError::InvalidInput(_)));
    }

    #[test]
    fn test_today_plan_is_repeatable() {
        let service = service();
        seed(&service, "alice", 40, t0() - Duration::days(3));
        let request = PlanRequest::new(20, 30);
        let first = service.today_plan("alice", &request, t0()).unwrap();
        let second = service.today_plan("alice", &request, t0()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_adaptive_target_shrinks_for_short_sessions() {
        let policy = StudyPolicy {
            adaptive_target: true,
            ..StudyPolicy::default()
        };
        let service = service().with_policy(policy);
        seed(&service, "alice", 50, t0() - Duration::days(3));
        service.record_session("alice", t0() - Duration::hours(2), 120);

        let plan = service
            .today_plan("alice", &PlanRequest::new(20, 50), t0())
            .unwrap();
        assert_eq!(plan.words.len(), 16);
    }

    #[test]
    fn test_adaptive_target_survives_session_outage() {
        let policy = StudyPolicy {
            adaptive_target: true,
            ..StudyPolicy::default()
        };
        let service = service()
            .with_policy(policy)
            .with_session_store(Arc::new(BrokenSessions));
        seed(&service, "alice", 30, t0() - Duration::days(3));

        let plan = service
            .today_plan("alice", &PlanRequest::new(20, 50), t0())
            .unwrap();
        assert_eq!(plan.words.len(), 20);
    }

    #[test]
    fn test_streak_scenario_with_gap() {
        let service = service();
        let day1 = t0();
        let day3 = t0() + Duration::days(2);

        service.record_study("alice", day1).unwrap();
        service.record_study("alice", day1 + Duration::hours(3)).unwrap();
        let stats = service.record_study("alice", day3).unwrap();

        assert_eq!(stats.streak_days, 1);
        assert_eq!(stats.total_days, 2);
        assert_eq!(stats.last_study_date, Some(day3.date_naive()));
    }

    #[test]
    fn test_overview_counts() {
        let service = service();
        let words = seed(&service, "alice", 3, t0());
        service.apply_outcome("alice", words[0].id, false, t0()).unwrap();
        service.record_study("alice", t0()).unwrap();

        let later = t0() + Duration::hours(1);
        let overview = service.overview("alice", later).unwrap();
        assert_eq!(overview.word_count, 3);
        assert_eq!(overview.due_count, 1);
        assert_eq!(overview.stats.today_count, 1);
        assert_eq!(overview.stats.streak_days, 1);
    }

    #[test]
    fn test_incorrect_words_latest_first() {
        let service = service();
        let words = seed(&service, "alice", 3, t0());
        service.apply_outcome("alice", words[0].id, false, t0()).unwrap();
        service
            .apply_outcome("alice", words[1].id, true, t0() + Duration::minutes(1))
            .unwrap();
        service
            .apply_outcome("alice", words[2].id, false, t0() + Duration::minutes(2))
            .unwrap();

        let terms: Vec<_> = service
            .incorrect_words("alice")
            .unwrap()
            .into_iter()
            .map(|w| w.term)
            .collect();
        assert_eq!(terms, vec!["w2", "w0"]);
    }

    #[test]
    fn test_record_session_thresholds() {
        let service = service();
        assert_eq!(service.record_session("alice", t0(), 9), SessionAck::TooShort);
        assert_eq!(service.record_session("alice", t0(), 10), SessionAck::Recorded);
        let behavior = service.behavior("alice", t0() + Duration::minutes(1)).unwrap();
        assert_eq!(behavior.sessions_last_7_days, 1);
    }

    #[test]
    fn test_session_failure_is_swallowed() {
        let service = service().with_session_store(Arc::new(BrokenSessions));
        let word = seed(&service, "alice", 1, t0()).remove(0);

        assert_eq!(service.record_session("alice", t0(), 600), SessionAck::Dropped);
        let updated = service.apply_outcome("alice", word.id, true, t0()).unwrap();
        assert_eq!(updated.familiarity, 1);
        assert!(matches!(
            service.behavior("alice", t0()),
            Err(StudyError::DependencyFailure(_))
        ));
    }

    #[test]
    fn test_concurrent_outcomes_are_serialized() {
        let service = Arc::new(service());
        let word = seed(&service, "alice", 1, t0()).remove(0);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                thread::spawn(move || service.apply_outcome("alice", word.id, true, t0()).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(service.get_word("alice", word.id).unwrap().familiarity, 4);
        assert_eq!(service.stats("alice", t0()).unwrap().today_count, 4);
    }

    #[test]
    fn test_failed_review_leaves_word_untouched() {
        let store = Arc::new(FlakyLog::default());
        let service = StudyService::new(Arc::clone(&store));
        let word = seed(&service, "alice", 1, t0()).remove(0);

        store.down.store(true, Ordering::SeqCst);
        let err = service.apply_outcome("alice", word.id, true, t0()).unwrap_err();
        assert!(matches!(err, StudyError::DependencyFailure(_)));
        assert_eq!(service.get_word("alice", word.id).unwrap(), word);
        assert_eq!(service.stats("alice", t0()).unwrap().today_count, 0);

        store.down.store(false, Ordering::SeqCst);
        let retried = service.apply_outcome("alice", word.id, true, t0()).unwrap();
        assert_eq!(retried.familiarity, 1);
        assert_eq!(service.stats("alice", t0()).unwrap().today_count, 1);
    }

    #[test]
    fn test_idle_user_locks_are_released() {
        let service = service();
        for user in ["alice", "bob", "carol", "dave"] {
            let word = seed(&service, user, 1, t0()).remove(0);
            service.apply_outcome(user, word.id, true, t0()).unwrap();
        }
        let locks = service.user_locks.lock().unwrap();
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key("dave"));
    }
}
