//! Grading of completed test sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::CATEGORIES;
use crate::model::{
    Category, CategoryBreakdown, ResultDraft, ResultError, TestSession, TestSessionError,
};

/// Aggregate outcome of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreCard {
    pub score: u32,
    pub total_questions: u32,
    pub elapsed_seconds: u64,
    pub category_breakdown: CategoryBreakdown,
}

impl ScoreCard {
    /// Score a session that has already been marked completed.
    ///
    /// Unanswered entries count as incorrect and stay in `total_questions`.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError::NotCompleted` if the session is still open.
    pub fn from_completed(session: &TestSession) -> Result<Self, TestSessionError> {
        let ended_at = match (session.is_completed(), session.ended_at()) {
            (true, Some(end)) => end,
            _ => return Err(TestSessionError::NotCompleted),
        };

        let mut category_breakdown = CategoryBreakdown::default();
        for entry in session.entries().iter().filter(|e| e.is_correct()) {
            category_breakdown.increment(entry.category());
        }

        let total_questions = u32::try_from(session.total_questions()).map_err(|_| {
            TestSessionError::InvalidPersistedState("too many entries in session".into())
        })?;

        Ok(Self {
            score: category_breakdown.total(),
            total_questions,
            elapsed_seconds: elapsed_seconds(session.started_at(), ended_at),
            category_breakdown,
        })
    }

    /// Build the persistable result for this score card.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if the card is internally inconsistent.
    pub fn to_result(
        &self,
        session: &TestSession,
        created_at: DateTime<Utc>,
    ) -> Result<ResultDraft, ResultError> {
        ResultDraft::new(
            session.user_id(),
            session.id(),
            self.score,
            self.total_questions,
            self.elapsed_seconds,
            self.category_breakdown,
            created_at,
        )
    }
}

/// Whole seconds between two instants, floored and never negative.
#[must_use]
pub fn elapsed_seconds(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> u64 {
    let millis = (ended_at - started_at).num_milliseconds().max(0);
    u64::try_from(millis / 1_000).unwrap_or(0)
}

/// Correct and total counts for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub category: Category,
    pub correct: u32,
    pub total: u32,
}

impl CategoryTally {
    /// Accuracy as a percentage rounded to two decimals; 0 when empty.
    #[must_use]
    pub fn accuracy_percent(&self) -> f64 {
        percent(self.correct, self.total)
    }
}

/// Per-category correct/total counts for a session, in catalog order.
#[must_use]
pub fn tally_by_category(session: &TestSession) -> Vec<CategoryTally> {
    CATEGORIES
        .into_iter()
        .map(|category| {
            let (correct, total) = session
                .entries()
                .iter()
                .filter(|e| e.category() == category)
                .fold((0_u32, 0_u32), |(c, t), e| {
                    (c + u32::from(e.is_correct()), t + 1)
                });
            CategoryTally {
                category,
                correct,
                total,
            }
        })
        .collect()
}

/// `part / whole` as a percentage with two decimals.
#[must_use]
pub fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(f64::from(part) * 100.0 / f64::from(whole))
}

#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
