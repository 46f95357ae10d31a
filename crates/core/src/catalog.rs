//! Shape of a generated placement test.
//!
//! The category and difficulty sets live here and nowhere else; sampling,
//! scoring, storage and reporting all iterate these constants.

use crate::model::{Category, Difficulty};

/// Every category a test covers, in presentation order.
pub const CATEGORIES: [Category; 4] = [
    Category::Mathematics,
    Category::Reasoning,
    Category::Technical,
    Category::Database,
];

/// Every difficulty band, in presentation order.
pub const DIFFICULTIES: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

/// Questions drawn from each (category, difficulty) bucket.
pub const QUESTIONS_PER_BUCKET: u32 = 5;

/// Advisory time limit for a test (two hours).
pub const DEFAULT_DURATION_SECS: u32 = 7_200;

/// Sampling plan for a test: one draw per bucket plus the advisory duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestBlueprint {
    questions_per_bucket: u32,
    duration_secs: u32,
}

impl Default for TestBlueprint {
    fn default() -> Self {
        Self {
            questions_per_bucket: QUESTIONS_PER_BUCKET,
            duration_secs: DEFAULT_DURATION_SECS,
        }
    }
}

impl TestBlueprint {
    #[must_use]
    pub fn new(questions_per_bucket: u32, duration_secs: u32) -> Self {
        Self {
            questions_per_bucket,
            duration_secs,
        }
    }

    #[must_use]
    pub fn questions_per_bucket(&self) -> u32 {
        self.questions_per_bucket
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Buckets in sampling order: categories outer, difficulties inner.
    pub fn buckets(&self) -> impl Iterator<Item = (Category, Difficulty)> {
        CATEGORIES
            .into_iter()
            .flat_map(|c| DIFFICULTIES.into_iter().map(move |d| (c, d)))
    }
}
