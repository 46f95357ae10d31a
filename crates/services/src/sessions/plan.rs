use placement_core::catalog::TestBlueprint;
use placement_core::model::{Category, Difficulty, QuestionRef};
use storage::repository::{QuestionRepository, StorageError};

/// A bucket that could not supply the requested number of questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortBucket {
    pub category: Category,
    pub difficulty: Difficulty,
    pub requested: u32,
    pub drawn: usize,
}

/// Questions drawn for a new test, in blueprint bucket order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    questions: Vec<QuestionRef>,
    short_buckets: Vec<ShortBucket>,
}

impl TestPlan {
    /// Sample every bucket of the blueprint once.
    ///
    /// A bucket with fewer questions than requested contributes all of them.
    ///
    /// # Errors
    ///
    /// Propagates the first sampling failure; nothing is retried.
    pub async fn draw(
        questions: &dyn QuestionRepository,
        blueprint: &TestBlueprint,
    ) -> Result<Self, StorageError> {
        let requested = blueprint.questions_per_bucket();
        let mut drawn = Vec::new();
        let mut short_buckets = Vec::new();

        for (category, difficulty) in blueprint.buckets() {
            let bucket = questions.sample(category, difficulty, requested).await?;
            if bucket.len() < usize::try_from(requested).unwrap_or(usize::MAX) {
                short_buckets.push(ShortBucket {
                    category,
                    difficulty,
                    requested,
                    drawn: bucket.len(),
                });
            }
            drawn.extend(bucket);
        }

        Ok(Self {
            questions: drawn,
            short_buckets,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn short_buckets(&self) -> &[ShortBucket] {
        &self.short_buckets
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<QuestionRef> {
        self.questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::model::QuestionDraft;
    use storage::repository::InMemoryRepository;

    async fn seed(repo: &InMemoryRepository, category: Category, difficulty: Difficulty, n: u32) {
        let batch: Vec<_> = (0..n)
            .map(|i| {
                QuestionDraft {
                    category,
                    difficulty,
                    question_text: format!("{category}/{difficulty} {i}"),
                    options: vec!["yes".into(), "no".into()],
                    correct_answer: "yes".into(),
                    source: None,
                }
                .validate()
                .unwrap()
            })
            .collect();
        repo.insert_questions(&batch).await.unwrap();
    }

    #[tokio::test]
    async fn draws_buckets_in_catalog_order() {
        let repo = InMemoryRepository::new();
        let blueprint = TestBlueprint::default();
        for (category, difficulty) in blueprint.buckets() {
            seed(&repo, category, difficulty, 6).await;
        }

        let plan = TestPlan::draw(&repo, &blueprint).await.unwrap();
        assert_eq!(plan.len(), 60);
        assert!(plan.short_buckets().is_empty());

        let questions = plan.into_questions();
        let order: Vec<_> = questions
            .chunks(5)
            .map(|chunk| (chunk[0].category, chunk[0].difficulty))
            .collect();
        let expected: Vec<_> = blueprint.buckets().collect();
        assert_eq!(order, expected);
    }

    #[tokio::test]
    async fn short_and_empty_buckets_are_reported() {
        let repo = InMemoryRepository::new();
        seed(&repo, Category::Reasoning, Difficulty::Medium, 3).await;

        let plan = TestPlan::draw(&repo, &TestBlueprint::default()).await.unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.short_buckets().len(), 12);
        assert!(plan.short_buckets().iter().any(|b| {
            b.category == Category::Reasoning && b.difficulty == Difficulty::Medium && b.drawn == 3
        }));
    }

    #[tokio::test]
    async fn oversized_blueprint_draws_what_exists() {
        let repo = InMemoryRepository::new();
        seed(&repo, Category::Mathematics, Difficulty::Easy, 2).await;

        let blueprint = TestBlueprint::new(u32::MAX, 60);
        let plan = TestPlan::draw(&repo, &blueprint).await.unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.short_buckets().iter().all(|b| b.requested == u32::MAX));
    }

    #[tokio::test]
    async fn empty_bank_yields_empty_plan() {
        let repo = InMemoryRepository::new();
        let plan = TestPlan::draw(&repo, &TestBlueprint::default()).await.unwrap();
        assert!(plan.is_empty());
    }
}
