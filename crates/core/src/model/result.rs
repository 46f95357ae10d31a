use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CATEGORIES;
use crate::model::ids::{ResultId, TestSessionId, UserId};
use crate::model::question::Category;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("score ({score}) exceeds total questions ({total})")]
    ScoreExceedsTotal { score: u32, total: u32 },

    #[error("score ({score}) does not match category breakdown ({sum})")]
    BreakdownMismatch { score: u32, sum: u32 },
}

/// Correct answers per category. Every category is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CategoryBreakdown {
    pub mathematics: u32,
    pub reasoning: u32,
    pub technical: u32,
    pub database: u32,
}

impl CategoryBreakdown {
    #[must_use]
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Mathematics => self.mathematics,
            Category::Reasoning => self.reasoning,
            Category::Technical => self.technical,
            Category::Database => self.database,
        }
    }

    pub fn increment(&mut self, category: Category) {
        let slot = match category {
            Category::Mathematics => &mut self.mathematics,
            Category::Reasoning => &mut self.reasoning,
            Category::Technical => &mut self.technical,
            Category::Database => &mut self.database,
        };
        *slot = slot.saturating_add(1);
    }

    /// Sum over all categories.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.iter().map(|(_, n)| n).sum()
    }

    /// Pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, u32)> + '_ {
        CATEGORIES.into_iter().map(|c| (c, self.get(c)))
    }
}

/// A scored result, validated but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDraft {
    user_id: UserId,
    session_id: TestSessionId,
    score: u32,
    total_questions: u32,
    elapsed_seconds: u64,
    category_breakdown: CategoryBreakdown,
    created_at: DateTime<Utc>,
}

impl ResultDraft {
    /// # Errors
    ///
    /// Returns `ResultError` if the score exceeds the question count or does not
    /// equal the sum of the category breakdown.
    pub fn new(
        user_id: UserId,
        session_id: TestSessionId,
        score: u32,
        total_questions: u32,
        elapsed_seconds: u64,
        category_breakdown: CategoryBreakdown,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        if score > total_questions {
            return Err(ResultError::ScoreExceedsTotal {
                score,
                total: total_questions,
            });
        }
        let sum = category_breakdown.total();
        if sum != score {
            return Err(ResultError::BreakdownMismatch { score, sum });
        }
        Ok(Self {
            user_id,
            session_id,
            score,
            total_questions,
            elapsed_seconds,
            category_breakdown,
            created_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn session_id(&self) -> TestSessionId {
        self.session_id
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    #[must_use]
    pub fn category_breakdown(&self) -> CategoryBreakdown {
        self.category_breakdown
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn assign_id(self, id: ResultId) -> TestResult {
        TestResult { id, draft: self }
    }
}

/// Immutable scored outcome of a completed test session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    id: ResultId,
    draft: ResultDraft,
}

impl TestResult {
    #[must_use]
    pub fn id(&self) -> ResultId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.draft.user_id
    }

    #[must_use]
    pub fn session_id(&self) -> TestSessionId {
        self.draft.session_id
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.draft.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.draft.total_questions
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.draft.elapsed_seconds
    }

    #[must_use]
    pub fn category_breakdown(&self) -> CategoryBreakdown {
        self.draft.category_breakdown
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.draft.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn breakdown_serializes_with_category_names() {
        let mut b = CategoryBreakdown::default();
        b.increment(Category::Mathematics);
        b.increment(Category::Mathematics);
        b.increment(Category::Database);

        let json = serde_json::to_value(b).unwrap();
        assert_eq!(json["Mathematics"], 2);
        assert_eq!(json["Reasoning"], 0);
        assert_eq!(json["Database"], 1);
        assert_eq!(b.total(), 3);
    }

    #[test]
    fn draft_rejects_inconsistent_scores() {
        let breakdown = CategoryBreakdown {
            mathematics: 2,
            ..CategoryBreakdown::default()
        };
        let err = ResultDraft::new(
            UserId::new(1),
            TestSessionId::new(1),
            3,
            60,
            10,
            breakdown,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ResultError::BreakdownMismatch { score: 3, sum: 2 });

        let err = ResultDraft::new(
            UserId::new(1),
            TestSessionId::new(1),
            2,
            1,
            10,
            breakdown,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ResultError::ScoreExceedsTotal { score: 2, total: 1 });
    }
}
