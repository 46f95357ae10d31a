use std::sync::Arc;

use serde::Serialize;

use placement_core::catalog::{CATEGORIES, DIFFICULTIES, TestBlueprint};
use placement_core::model::{
    Category, Difficulty, Identity, Question, QuestionDraft, QuestionId, QuestionSource,
};
use storage::repository::{Page, QuestionFilter, QuestionRepository, StorageError};

use crate::error::QuestionServiceError;
use crate::seed::generated_drafts;

/// Inventory of one (category, difficulty) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStats {
    pub category: Category,
    pub difficulty: Difficulty,
    pub count: u64,
    /// Whether the bucket can supply a full test's draw.
    pub fills_bucket: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: Category,
    pub count: u64,
}

/// Question bank inventory in catalog order, including empty buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankStats {
    pub total: u64,
    pub categories: Vec<CategoryCount>,
    pub buckets: Vec<BucketStats>,
}

impl BankStats {
    /// True when every bucket can supply a full draw.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.buckets.iter().all(|b| b.fills_bucket)
    }
}

/// A stored question with its correct answer, for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDetail {
    pub id: QuestionId,
    pub category: Category,
    pub difficulty: Difficulty,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub source: Option<QuestionSource>,
}

impl From<&Question> for QuestionDetail {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id(),
            category: question.category(),
            difficulty: question.difficulty(),
            question_text: question.text().to_owned(),
            options: question.options().to_vec(),
            correct_answer: question.correct_answer().to_owned(),
            source: question.source(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPage {
    pub page: u32,
    pub limit: u32,
    /// Questions matching the filter across all pages.
    pub total: u64,
    pub questions: Vec<QuestionDetail>,
}

/// Orchestrates question authoring and bank inventory.
#[derive(Clone)]
pub struct QuestionService {
    blueprint: TestBlueprint,
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionService {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self {
            blueprint: TestBlueprint::default(),
            questions,
        }
    }

    #[must_use]
    pub fn with_blueprint(mut self, blueprint: TestBlueprint) -> Self {
        self.blueprint = blueprint;
        self
    }

    /// Validate and store one question. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Unauthorized` for non-admins,
    /// `QuestionServiceError::Question` for validation failures, and
    /// `QuestionServiceError::Storage` if persistence fails.
    pub async fn create_question(
        &self,
        identity: Identity,
        draft: QuestionDraft,
    ) -> Result<QuestionId, QuestionServiceError> {
        if !identity.is_admin() {
            return Err(QuestionServiceError::Unauthorized);
        }
        let question = draft.validate()?;
        let id = self.questions.insert_question(&question).await?;
        tracing::info!(question = %id, category = %question.category, "question created");
        Ok(id)
    }

    /// Validate every draft, then store all of them or none. Admin only.
    ///
    /// Returns the number of questions stored.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::InvalidImport` naming the first invalid
    /// draft (zero-based); nothing is stored in that case.
    pub async fn import_questions(
        &self,
        identity: Identity,
        drafts: Vec<QuestionDraft>,
    ) -> Result<usize, QuestionServiceError> {
        if !identity.is_admin() {
            return Err(QuestionServiceError::Unauthorized);
        }
        self.import_unchecked(drafts).await
    }

    async fn import_unchecked(
        &self,
        drafts: Vec<QuestionDraft>,
    ) -> Result<usize, QuestionServiceError> {
        let validated = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                draft
                    .validate()
                    .map_err(|source| QuestionServiceError::InvalidImport { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ids = self.questions.insert_questions(&validated).await?;
        tracing::info!(count = ids.len(), "questions imported");
        Ok(ids.len())
    }

    /// Browse the bank by bucket. Admin only, since answers are included.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Unauthorized` for non-admins and
    /// `QuestionServiceError::Storage` if the bank cannot be queried.
    pub async fn list_questions(
        &self,
        identity: Identity,
        filter: QuestionFilter,
        page: Page,
    ) -> Result<QuestionPage, QuestionServiceError> {
        if !identity.is_admin() {
            return Err(QuestionServiceError::Unauthorized);
        }
        let listed = self.questions.list_questions(filter, page).await?;
        Ok(QuestionPage {
            page: page.number(),
            limit: page.size(),
            total: listed.total,
            questions: listed.items.iter().map(QuestionDetail::from).collect(),
        })
    }

    /// # Errors
    ///
    /// Returns `QuestionServiceError::Unauthorized` for non-admins and
    /// `QuestionServiceError::NotFound` for an unknown id.
    pub async fn get_question(
        &self,
        identity: Identity,
        id: QuestionId,
    ) -> Result<QuestionDetail, QuestionServiceError> {
        if !identity.is_admin() {
            return Err(QuestionServiceError::Unauthorized);
        }
        match self.questions.get_question(id).await {
            Ok(question) => Ok(QuestionDetail::from(&question)),
            Err(StorageError::NotFound) => Err(QuestionServiceError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Top up every bucket with generated questions until it holds `per_bucket`.
    ///
    /// Buckets that already hold enough are left alone, so seeding twice adds
    /// nothing the second time. Returns the number of questions added.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if repository access fails.
    pub async fn seed_bank(&self, per_bucket: u64) -> Result<usize, QuestionServiceError> {
        let stats = self.bank_stats().await?;
        let drafts: Vec<QuestionDraft> = stats
            .buckets
            .iter()
            .filter(|b| b.count < per_bucket)
            .flat_map(|b| {
                generated_drafts(b.category, b.difficulty, b.count, per_bucket - b.count)
            })
            .collect();

        if drafts.is_empty() {
            tracing::info!("question bank already seeded");
            return Ok(0);
        }
        self.import_unchecked(drafts).await
    }

    /// Per-category totals and per-bucket counts, flagging buckets that
    /// cannot fill a full test.
    ///
    /// # Errors
    ///
    /// Returns `QuestionServiceError::Storage` if repository access fails.
    pub async fn bank_stats(&self) -> Result<BankStats, QuestionServiceError> {
        let counts = self.questions.bucket_counts().await?;
        let needed = u64::from(self.blueprint.questions_per_bucket());

        let count_of = |category: Category, difficulty: Difficulty| {
            counts
                .iter()
                .find(|b| b.category == category && b.difficulty == difficulty)
                .map_or(0, |b| b.count)
        };

        let buckets: Vec<BucketStats> = self
            .blueprint
            .buckets()
            .map(|(category, difficulty)| {
                let count = count_of(category, difficulty);
                BucketStats {
                    category,
                    difficulty,
                    count,
                    fills_bucket: count >= needed,
                }
            })
            .collect();

        let categories = CATEGORIES
            .into_iter()
            .map(|category| CategoryCount {
                category,
                count: DIFFICULTIES
                    .into_iter()
                    .map(|difficulty| count_of(category, difficulty))
                    .sum(),
            })
            .collect();

        Ok(BankStats {
            total: buckets.iter().map(|b| b.count).sum(),
            categories,
            buckets,
        })
    }
}
