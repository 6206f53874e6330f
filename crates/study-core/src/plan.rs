//! Daily plan selection.
//!
//! A plan is built from two pools. Due words have been reviewed and are
//! scheduled at or before `now`; new words have never been reviewed (and,
//! with a cutoff, were created at or after it). The requested ratio splits
//! the quota between the pools; whichever pool runs short hands its unused
//! slots to the other. Due words always come first in the result.
//!
//! Selection is a pure function of its inputs: no shuffling, and ties are
//! broken by word id, so the same inputs always give the same plan.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StudyResult;
use crate::models::{PlanRequest, Word, WordId};

/// How a quota is divided between review and new slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSplit {
    pub review: usize,
    pub new: usize,
}

impl PlanSplit {
    /// `new = round(quota * ratio / 100)`, half rounding up.
    pub fn of(quota: usize, new_word_ratio: u32) -> Self {
        let ratio = new_word_ratio.min(PlanRequest::MAX_NEW_WORD_RATIO) as usize;
        let new = (quota * ratio + 50) / 100;
        Self {
            review: quota - new,
            new,
        }
    }
}

/// Build today's plan with the request's full daily target as the quota.
pub fn select_today(
    all_words: &[Word],
    due_words: &[Word],
    now: DateTime<Utc>,
    request: &PlanRequest,
) -> StudyResult<Vec<Word>> {
    select_with_quota(all_words, due_words, now, request, request.daily_target as usize)
}

/// Build a plan of at most `quota` words.
///
/// The request is validated even when the quota was derived from it, so an
/// out-of-range target or ratio is rejected rather than quietly reshaped.
pub fn select_with_quota(
    all_words: &[Word],
    due_words: &[Word],
    now: DateTime<Utc>,
    request: &PlanRequest,
    quota: usize,
) -> StudyResult<Vec<Word>> {
    request.validate()?;

    let due = due_pool(due_words, now);
    let due_ids: HashSet<WordId> = due.iter().map(|w| w.id).collect();
    let new = new_pool(all_words, &due_ids, request.imported_after);

    let split = PlanSplit::of(quota, request.new_word_ratio);
    let mut take_due = split.review.min(due.len());
    let mut take_new = split.new.min(new.len());

    // Hand unused slots across, review side first.
    let mut spare = quota - take_due - take_new;
    let extra_due = spare.min(due.len() - take_due);
    take_due += extra_due;
    spare -= extra_due;
    take_new += spare.min(new.len() - take_new);

    debug!(
        quota,
        due_available = due.len(),
        new_available = new.len(),
        take_due,
        take_new,
        "composed daily plan"
    );

    Ok(due
        .into_iter()
        .take(take_due)
        .chain(new.into_iter().take(take_new))
        .cloned()
        .collect())
}

/// Due words, oldest schedule first.
fn due_pool(words: &[Word], now: DateTime<Utc>) -> Vec<&Word> {
    let mut seen = HashSet::new();
    let mut pool: Vec<&Word> = words
        .iter()
        .filter(|w| w.is_due(now))
        .filter(|w| seen.insert(w.id))
        .collect();
    pool.sort_by(|a, b| {
        a.next_review_at
            .cmp(&b.next_review_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    pool
}

/// New words not already due, oldest first.
fn new_pool<'a>(
    words: &'a [Word],
    due_ids: &HashSet<WordId>,
    imported_after: Option<DateTime<Utc>>,
) -> Vec<&'a Word> {
    let mut seen = HashSet::new();
    let mut pool: Vec<&Word> = words
        .iter()
        .filter(|w| !due_ids.contains(&w.id))
        .filter(|w| w.is_new(imported_after))
        .filter(|w| seen.insert(w.id))
        .collect();
    pool.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    pool
}
