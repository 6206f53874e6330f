//! Study engine for vocabulary learning.
//!
//! This crate decides what a learner studies and when:
//! - Review scheduling: familiarity levels and next-review times
//! - Daily plans: today's mix of due and new words
//! - Study stats: study days and streaks
//! - Behavior: session habits over the trailing week
//!
//! Storage is reached through the traits in [`store`]; [`MemoryStore`] is a
//! ready implementation for tests and embedding.

pub mod algorithm;
pub mod behavior;
pub mod calendar;
pub mod error;
pub mod memory;
pub mod models;
pub mod plan;
pub mod service;
pub mod stats;
pub mod store;

// Re-exports
pub use algorithm::{get_scheduler, Doubling, Ladder, ReviewScheduler};
pub use calendar::StudyCalendar;
pub use error::{StudyError, StudyResult};
pub use memory::MemoryStore;
pub use models::{
    ImportSummary, Overview, PlanRequest, ReviewOutcome, ReviewRecord, SessionAck, StudyBehavior,
    StudyPolicy, StudySession, StudyStats, TodayPlan, UserId, Word, WordDraft, WordId,
    MAX_FAMILIARITY,
};
pub use plan::{select_today, select_with_quota};
pub use service::StudyService;
pub use store::{ReviewLog, SessionStore, StatsStore, StoreError, StoreResult, WordRepository};
