use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use placement_core::catalog::CATEGORIES;
use placement_core::model::{
    Category, CategoryBreakdown, Difficulty, Identity, QuestionId, ResultId, TestResult,
    TestSessionId, UserId,
};
use placement_core::scoring::{CategoryTally, percent, round2, tally_by_category};
use storage::repository::{
    QuestionRepository, ResultRepository, StorageError, TestSessionRepository,
};

use crate::error::ResultServiceError;

/// Number of results shown in the "recent" part of performance stats.
pub const RECENT_RESULTS: usize = 5;

const UNBOUNDED: u32 = u32::MAX;

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

/// Presentation-agnostic copy of a stored result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub id: ResultId,
    pub user_id: UserId,
    pub session_id: TestSessionId,
    pub score: u32,
    pub total_questions: u32,
    pub elapsed_seconds: u64,
    pub category_breakdown: CategoryBreakdown,
    pub created_at: DateTime<Utc>,
}

impl From<&TestResult> for ResultSummary {
    fn from(result: &TestResult) -> Self {
        Self {
            id: result.id(),
            user_id: result.user_id(),
            session_id: result.session_id(),
            score: result.score(),
            total_questions: result.total_questions(),
            elapsed_seconds: result.elapsed_seconds(),
            category_breakdown: result.category_breakdown(),
            created_at: result.created_at(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAccuracy {
    pub category: Category,
    pub correct: u32,
    pub total: u32,
    pub accuracy_percent: f64,
}

impl From<CategoryTally> for CategoryAccuracy {
    fn from(tally: CategoryTally) -> Self {
        Self {
            category: tally.category,
            correct: tally.correct,
            total: tally.total,
            accuracy_percent: tally.accuracy_percent(),
        }
    }
}

/// Aggregate performance across all of a user's results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub total_tests: usize,
    pub average_score: f64,
    pub highest_score: u32,
    pub lowest_score: u32,
    pub category_accuracy: Vec<CategoryAccuracy>,
    pub recent: Vec<ResultSummary>,
}

/// One question of a completed test, with the answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalysis {
    pub number: usize,
    pub question_id: QuestionId,
    pub category: Category,
    pub difficulty: Difficulty,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub user_answer: Option<String>,
    pub is_correct: bool,
}

/// Per-question review of a completed test.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAnalysis {
    pub result: ResultSummary,
    pub category_accuracy: Vec<CategoryAccuracy>,
    pub questions: Vec<QuestionAnalysis>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Read-side queries over recorded results.
#[derive(Clone)]
pub struct ResultService {
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn TestSessionRepository>,
    results: Arc<dyn ResultRepository>,
}

impl ResultService {
    #[must_use]
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn TestSessionRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            questions,
            sessions,
            results,
        }
    }

    /// The caller's results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ResultServiceError::Storage` if repository access fails.
    pub async fn list_results(
        &self,
        identity: Identity,
        limit: u32,
    ) -> Result<Vec<ResultSummary>, ResultServiceError> {
        let results = self
            .results
            .list_user_results(identity.user_id, limit)
            .await?;
        Ok(results.iter().map(ResultSummary::from).collect())
    }

    /// Every user's results, newest first. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `ResultServiceError::Unauthorized` for non-admins.
    pub async fn list_all_results(
        &self,
        identity: Identity,
        limit: u32,
    ) -> Result<Vec<ResultSummary>, ResultServiceError> {
        if !identity.is_admin() {
            return Err(ResultServiceError::Unauthorized);
        }
        let results = self.results.list_results(limit).await?;
        Ok(results.iter().map(ResultSummary::from).collect())
    }

    /// # Errors
    ///
    /// Returns `ResultServiceError::NotFound` for an unknown id and
    /// `ResultServiceError::Unauthorized` unless the caller owns the result
    /// or is an admin.
    pub async fn result_details(
        &self,
        identity: Identity,
        result_id: ResultId,
    ) -> Result<ResultSummary, ResultServiceError> {
        let result = self.load_for(identity, result_id).await?;
        Ok(ResultSummary::from(&result))
    }

    /// Totals, score range and per-category accuracy over all of the caller's
    /// results. `None` when the caller has no results yet.
    ///
    /// # Errors
    ///
    /// Returns `ResultServiceError::Storage` if repository access fails.
    pub async fn performance_stats(
        &self,
        identity: Identity,
    ) -> Result<Option<PerformanceStats>, ResultServiceError> {
        let results = self
            .results
            .list_user_results(identity.user_id, UNBOUNDED)
            .await?;
        if results.is_empty() {
            return Ok(None);
        }

        let mut correct = [0_u32; CATEGORIES.len()];
        let mut total = [0_u32; CATEGORIES.len()];
        for result in &results {
            let session = self.sessions.get_session(result.session_id()).await?;
            for (i, tally) in tally_by_category(&session).into_iter().enumerate() {
                correct[i] += tally.correct;
                total[i] += tally.total;
            }
        }

        let scores: Vec<u32> = results.iter().map(TestResult::score).collect();
        let sum: u64 = scores.iter().map(|&s| u64::from(s)).sum();
        #[allow(clippy::cast_precision_loss)]
        let average_score = round2(sum as f64 / scores.len() as f64);

        let category_accuracy = CATEGORIES
            .into_iter()
            .enumerate()
            .map(|(i, category)| CategoryAccuracy {
                category,
                correct: correct[i],
                total: total[i],
                accuracy_percent: percent(correct[i], total[i]),
            })
            .collect();

        Ok(Some(PerformanceStats {
            total_tests: results.len(),
            average_score,
            highest_score: scores.iter().copied().max().unwrap_or(0),
            lowest_score: scores.iter().copied().min().unwrap_or(0),
            category_accuracy,
            recent: results
                .iter()
                .take(RECENT_RESULTS)
                .map(ResultSummary::from)
                .collect(),
        }))
    }

    /// Question-by-question review of a completed test, including the
    /// correct answers.
    ///
    /// # Errors
    ///
    /// Returns `ResultServiceError::NotFound`, `ResultServiceError::Unauthorized`,
    /// or `ResultServiceError::NotCompleted` if the session is still open.
    pub async fn test_analysis(
        &self,
        identity: Identity,
        result_id: ResultId,
    ) -> Result<TestAnalysis, ResultServiceError> {
        let result = self.load_for(identity, result_id).await?;
        let session = self.sessions.get_session(result.session_id()).await?;
        if !session.is_completed() {
            return Err(ResultServiceError::NotCompleted);
        }

        let ids: Vec<QuestionId> = session.entries().iter().map(|e| e.question_id()).collect();
        let questions = self.questions.get_questions(&ids).await?;

        let analysis = session
            .entries()
            .iter()
            .zip(&questions)
            .enumerate()
            .map(|(i, (entry, question))| QuestionAnalysis {
                number: i + 1,
                question_id: entry.question_id(),
                category: entry.category(),
                difficulty: entry.difficulty(),
                text: question.text().to_owned(),
                options: question.options().to_vec(),
                correct_answer: question.correct_answer().to_owned(),
                user_answer: entry.answer().map(str::to_owned),
                is_correct: entry.is_correct(),
            })
            .collect();

        Ok(TestAnalysis {
            result: ResultSummary::from(&result),
            category_accuracy: tally_by_category(&session)
                .into_iter()
                .map(CategoryAccuracy::from)
                .collect(),
            questions: analysis,
        })
    }

    async fn load_for(
        &self,
        identity: Identity,
        result_id: ResultId,
    ) -> Result<TestResult, ResultServiceError> {
        let result = match self.results.get_result(result_id).await {
            Ok(result) => result,
            Err(StorageError::NotFound) => return Err(ResultServiceError::NotFound),
            Err(e) => return Err(e.into()),
        };
        if !identity.can_access(result.user_id()) {
            return Err(ResultServiceError::Unauthorized);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use placement_core::model::{NewTestSession, QuestionDraft, QuestionRef, ResultDraft};
    use placement_core::scoring::ScoreCard;
    use placement_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    struct Fixture {
        repo: InMemoryRepository,
        service: ResultService,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = InMemoryRepository::new();
            let shared = Arc::new(repo.clone());
            let service = ResultService::new(shared.clone(), shared.clone(), shared);
            Self { repo, service }
        }

        /// Persist a completed session for `user` answering `correct` of
        /// three Mathematics questions right, and record its result.
        async fn completed_test(&self, user: UserId, correct: usize, hours: i64) -> TestResult {
            let drafts: Vec<_> = (0..3)
                .map(|i| {
                    QuestionDraft {
                        category: Category::Mathematics,
                        difficulty: Difficulty::Easy,
                        question_text: format!("{user}-{hours}-{i}"),
                        options: vec!["1".into(), "2".into()],
                        correct_answer: "1".into(),
                        source: None,
                    }
                    .validate()
                    .unwrap()
                })
                .collect();
            let ids = self.repo.insert_questions(&drafts).await.unwrap();
            let refs: Vec<_> = ids
                .iter()
                .map(|&id| QuestionRef {
                    id,
                    category: Category::Mathematics,
                    difficulty: Difficulty::Easy,
                })
                .collect();

            let started = fixed_now() + Duration::hours(hours);
            let session = self
                .repo
                .insert_session(&NewTestSession::new(user, refs, started, 7_200))
                .await
                .unwrap();
            for (i, id) in ids.iter().enumerate() {
                let right = i < correct;
                self.repo
                    .record_answer(session.id(), *id, if right { "1" } else { "2" }, right)
                    .await
                    .unwrap();
            }
            self.repo
                .complete_session(session.id(), started + Duration::minutes(10))
                .await
                .unwrap();
            let session = self.repo.get_session(session.id()).await.unwrap();
            let card = ScoreCard::from_completed(&session).unwrap();
            let draft: ResultDraft = card.to_result(&session, started).unwrap();
            self.repo.insert_result(&draft).await.unwrap()
        }
    }

    #[tokio::test]
    async fn stats_are_none_without_results() {
        let fx = Fixture::new();
        let stats = fx
            .service
            .performance_stats(Identity::student(UserId::new(1)))
            .await
            .unwrap();
        assert!(stats.is_none());
    }

    #[tokio::test]
    async fn stats_aggregate_scores_and_category_accuracy() {
        let fx = Fixture::new();
        let user = UserId::new(1);
        fx.completed_test(user, 2, 0).await;
        fx.completed_test(user, 1, 1).await;
        fx.completed_test(UserId::new(2), 3, 2).await;

        let stats = fx
            .service
            .performance_stats(Identity::student(user))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.total_tests, 2);
        assert!((stats.average_score - 1.5).abs() < f64::EPSILON);
        assert_eq!(stats.highest_score, 2);
        assert_eq!(stats.lowest_score, 1);
        assert_eq!(stats.recent[0].score, 1);

        let maths = stats.category_accuracy[0];
        assert_eq!(maths.category, Category::Mathematics);
        assert_eq!((maths.correct, maths.total), (3, 6));
        assert!((maths.accuracy_percent - 50.0).abs() < f64::EPSILON);
        assert_eq!(stats.category_accuracy[1].total, 0);
    }

    #[tokio::test]
    async fn details_are_limited_to_owner_and_admin() {
        let fx = Fixture::new();
        let owner = UserId::new(1);
        let result = fx.completed_test(owner, 2, 0).await;

        assert!(matches!(
            fx.service
                .result_details(Identity::student(UserId::new(2)), result.id())
                .await,
            Err(ResultServiceError::Unauthorized)
        ));
        let as_admin = fx
            .service
            .result_details(Identity::admin(UserId::new(9)), result.id())
            .await
            .unwrap();
        assert_eq!(as_admin.score, 2);
        assert!(matches!(
            fx.service
                .result_details(Identity::student(owner), ResultId::new(77))
                .await,
            Err(ResultServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn analysis_includes_the_answer_key() {
        let fx = Fixture::new();
        let owner = Identity::student(UserId::new(1));
        let result = fx.completed_test(owner.user_id, 2, 0).await;

        let analysis = fx.service.test_analysis(owner, result.id()).await.unwrap();
        assert_eq!(analysis.questions.len(), 3);
        assert_eq!(analysis.questions[0].correct_answer, "1");
        assert!(analysis.questions[0].is_correct);
        assert_eq!(analysis.questions[2].user_answer.as_deref(), Some("2"));
        assert_eq!(analysis.category_accuracy[0].correct, 2);
    }

    #[tokio::test]
    async fn listing_everything_requires_admin() {
        let fx = Fixture::new();
        fx.completed_test(UserId::new(1), 1, 0).await;
        fx.completed_test(UserId::new(2), 1, 1).await;

        assert!(matches!(
            fx.service
                .list_all_results(Identity::student(UserId::new(1)), 10)
                .await,
            Err(ResultServiceError::Unauthorized)
        ));
        let all = fx
            .service
            .list_all_results(Identity::admin(UserId::new(9)), 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_id, UserId::new(2));

        let mine = fx
            .service
            .list_results(Identity::student(UserId::new(1)), 10)
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
    }
}
