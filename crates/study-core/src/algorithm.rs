//! Review scheduling.
//!
//! A word's familiarity moves one level per answer and picks the interval
//! until the word is due again. Curves are pluggable, but every curve must
//! be non-decreasing in familiarity so a wrong answer can never push a word
//! further out than a right one would have.

use chrono::{DateTime, Duration, Utc};

use crate::error::{StudyError, StudyResult};
use crate::models::{Word, MAX_FAMILIARITY};

/// Trait for familiarity-to-interval curves.
pub trait ReviewScheduler: Send + Sync {
    /// Curve name.
    fn name(&self) -> &str;

    /// Time until the next review for a word at `familiarity`.
    fn interval_for(&self, familiarity: u8) -> Duration;

    /// Apply one answer to a word.
    fn apply_outcome(&self, word: &Word, correct: bool, now: DateTime<Utc>) -> Word {
        let familiarity = next_familiarity(word.familiarity, correct);
        let mut updated = word.clone();
        updated.familiarity = familiarity;
        updated.next_review_at = Some(now + self.interval_for(familiarity));
        updated.updated_at = now;
        updated
    }
}

/// Familiarity after an answer, kept within `0..=MAX_FAMILIARITY`.
pub fn next_familiarity(current: u8, correct: bool) -> u8 {
    let current = current.min(MAX_FAMILIARITY);
    if correct {
        (current + 1).min(MAX_FAMILIARITY)
    } else {
        current.saturating_sub(1)
    }
}

const LEVELS: usize = MAX_FAMILIARITY as usize + 1;

/// Fixed interval per familiarity level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ladder {
    steps: [Duration; LEVELS],
}

impl Ladder {
    /// Default steps in minutes: 20 min, 1 d, 2 d, 4 d, 9 d, 21 d.
    pub const DEFAULT_MINUTES: [i64; LEVELS] = [20, 1_440, 2_880, 5_760, 12_960, 30_240];

    /// Build a ladder from per-level minutes.
    pub fn from_minutes(minutes: &[i64]) -> StudyResult<Self> {
        if minutes.len() != LEVELS {
            return Err(StudyError::InvalidInput(format!(
                "ladder needs {LEVELS} steps, got {}",
                minutes.len()
            )));
        }
        if minutes.iter().any(|m| *m < 0) {
            return Err(StudyError::InvalidInput("ladder steps must not be negative".into()));
        }
        if minutes.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(StudyError::InvalidInput(
                "ladder steps must not decrease with familiarity".into(),
            ));
        }

        let mut steps = [Duration::zero(); LEVELS];
        for (step, m) in steps.iter_mut().zip(minutes) {
            *step = Duration::minutes(*m);
        }
        Ok(Self { steps })
    }
}

impl Default for Ladder {
    fn default() -> Self {
        Self {
            steps: Self::DEFAULT_MINUTES.map(Duration::minutes),
        }
    }
}

impl ReviewScheduler for Ladder {
    fn name(&self) -> &str {
        "ladder"
    }

    fn interval_for(&self, familiarity: u8) -> Duration {
        self.steps[usize::from(familiarity.min(MAX_FAMILIARITY))]
    }
}

/// Interval doubling with each level above zero, up to a cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doubling {
    /// Level 0: retry later the same day.
    pub relearn: Duration,
    /// Level 1 interval; level n gets `base * 2^(n-1)`.
    pub base: Duration,
    /// Upper bound for any level.
    pub cap: Duration,
}

impl Doubling {
    pub fn new(base: Duration, cap: Duration) -> StudyResult<Self> {
        let relearn = Duration::minutes(20);
        if base < relearn || cap < base {
            return Err(StudyError::InvalidInput(
                "doubling needs relearn <= base <= cap".into(),
            ));
        }
        Ok(Self { relearn, base, cap })
    }
}

impl Default for Doubling {
    fn default() -> Self {
        Self {
            relearn: Duration::minutes(20),
            base: Duration::days(1),
            cap: Duration::days(30),
        }
    }
}

impl ReviewScheduler for Doubling {
    fn name(&self) -> &str {
        "doubling"
    }

    fn interval_for(&self, familiarity: u8) -> Duration {
        match familiarity.min(MAX_FAMILIARITY) {
            0 => self.relearn,
            level => {
                let factor = 1i32 << (level - 1);
                (self.base * factor).min(self.cap)
            }
        }
    }
}

/// Get scheduler by name.
pub fn get_scheduler(name: &str) -> Box<dyn ReviewScheduler> {
    match name.to_lowercase().as_str() {
        "doubling" => Box::new(Doubling::default()),
        _ => Box::new(Ladder::default()), // Default to the ladder
    }
}
