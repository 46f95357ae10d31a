use std::sync::Arc;

use placement_core::catalog::TestBlueprint;
use placement_core::model::{
    Identity, NewTestSession, QuestionId, TestResult, TestSession, TestSessionId,
};
use placement_core::scoring::ScoreCard;
use storage::repository::{
    Page, QuestionRepository, ResultRepository, SessionWrite, StorageError,
    TestSessionRepository,
};

use super::plan::TestPlan;
use super::view::{AnswerVerdict, QuestionsView, SessionPage, SessionSummary};
use crate::Clock;
use crate::error::TestError;
use crate::results::ResultRecorder;

/// Generates, runs and finalizes placement tests.
///
/// Holds no per-user state: the open session is always looked up in storage,
/// and every write that depends on the session being open is conditional in
/// the store.
#[derive(Clone)]
pub struct TestService {
    clock: Clock,
    blueprint: TestBlueprint,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn TestSessionRepository>,
    recorder: ResultRecorder,
}

impl TestService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn TestSessionRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            blueprint: TestBlueprint::default(),
            questions,
            sessions,
            recorder: ResultRecorder::new(results),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_blueprint(mut self, blueprint: TestBlueprint) -> Self {
        self.blueprint = blueprint;
        self
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Return the caller's open test, or generate and persist a new one.
    ///
    /// If a concurrent call creates the session first, that session is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// Returns `TestError::EmptyBank` if no bucket has any question, and
    /// `TestError::Storage` if sampling or persistence fails.
    pub async fn start_or_resume(&self, identity: Identity) -> Result<TestSession, TestError> {
        let user_id = identity.user_id;
        if let Some(open) = self.sessions.find_open_session(user_id).await? {
            tracing::debug!(user = %user_id, session = %open.id(), "resuming open test");
            return Ok(open);
        }

        let plan = TestPlan::draw(self.questions.as_ref(), &self.blueprint).await?;
        if plan.is_empty() {
            return Err(TestError::EmptyBank);
        }
        for short in plan.short_buckets() {
            tracing::warn!(
                category = %short.category,
                difficulty = %short.difficulty,
                requested = short.requested,
                drawn = short.drawn,
                "bucket has too few questions"
            );
        }

        let new = NewTestSession::new(
            user_id,
            plan.into_questions(),
            self.clock.now(),
            self.blueprint.duration_secs(),
        );

        match self.sessions.insert_session(&new).await {
            Ok(session) => {
                tracing::info!(
                    user = %user_id,
                    session = %session.id(),
                    questions = session.total_questions(),
                    "test session created"
                );
                Ok(session)
            }
            Err(StorageError::Conflict) => {
                tracing::warn!(user = %user_id, "lost test creation race; resuming winner");
                self.sessions
                    .find_open_session(user_id)
                    .await?
                    .ok_or(TestError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The caller's open test, if any.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Storage` if the lookup fails.
    pub async fn active_session(
        &self,
        identity: Identity,
    ) -> Result<Option<TestSession>, TestError> {
        Ok(self.sessions.find_open_session(identity.user_id).await?)
    }

    /// Every user's sessions, newest first, optionally only completed or
    /// only open ones. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Unauthorized` for non-admins and
    /// `TestError::Storage` if the listing fails.
    pub async fn list_sessions(
        &self,
        identity: Identity,
        completed: Option<bool>,
        page: Page,
    ) -> Result<SessionPage, TestError> {
        if !identity.is_admin() {
            return Err(TestError::Unauthorized);
        }
        let listed = self.sessions.list_sessions(completed, page).await?;
        Ok(SessionPage {
            page: page.number(),
            limit: page.size(),
            total: listed.total,
            sessions: listed.items.iter().map(SessionSummary::from).collect(),
        })
    }

    /// Grade and store one answer. Re-answering a question replaces the
    /// previous answer.
    ///
    /// # Errors
    ///
    /// Returns `TestError::SessionNotFound` or `TestError::QuestionNotInSession`
    /// for unknown ids, `TestError::Unauthorized` if the caller may not act on
    /// the session, and `TestError::AlreadyCompleted` once it is completed.
    pub async fn record_answer(
        &self,
        identity: Identity,
        session_id: TestSessionId,
        question_id: QuestionId,
        answer: &str,
    ) -> Result<AnswerVerdict, TestError> {
        let session = self.load_for(identity, session_id).await?;
        if session.entry(question_id).is_none() {
            return Err(TestError::QuestionNotInSession(question_id));
        }
        if session.is_completed() {
            return Err(TestError::AlreadyCompleted);
        }

        let answer = answer.trim();
        let correct = self.questions.correct_answer(question_id).await?;
        let is_correct = answer == correct;

        match self
            .sessions
            .record_answer(session_id, question_id, answer, is_correct)
            .await
        {
            Ok(SessionWrite::Applied) => {}
            Ok(SessionWrite::AlreadyCompleted) => {
                tracing::warn!(session = %session_id, "answer arrived after completion");
                return Err(TestError::AlreadyCompleted);
            }
            Err(StorageError::NotFound) => {
                return Err(TestError::QuestionNotInSession(question_id));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(
            session = %session_id,
            question = %question_id,
            is_correct,
            "answer graded"
        );
        Ok(AnswerVerdict {
            session_id,
            question_id,
            is_correct,
        })
    }

    /// Session metadata and every entry with its question text and options.
    ///
    /// # Errors
    ///
    /// Returns `TestError::SessionNotFound`, `TestError::Unauthorized`, or
    /// `TestError::Storage` if a question cannot be loaded.
    pub async fn questions_view(
        &self,
        identity: Identity,
        session_id: TestSessionId,
    ) -> Result<QuestionsView, TestError> {
        let session = self.load_for(identity, session_id).await?;
        let ids: Vec<QuestionId> = session.entries().iter().map(|e| e.question_id()).collect();
        let questions = self.questions.get_questions(&ids).await?;
        Ok(QuestionsView::build(&session, &questions))
    }

    /// Complete the test, score it and record its result.
    ///
    /// Completion is claimed in storage before scoring, so of two concurrent
    /// calls exactly one records a result and the other sees
    /// `AlreadyCompleted`. A completed test whose result was never stored is
    /// scored and recorded by the next call.
    ///
    /// # Errors
    ///
    /// Returns `TestError::SessionNotFound`, `TestError::Unauthorized`,
    /// `TestError::AlreadyCompleted` once a result exists, and
    /// `TestError::Storage` if recording fails.
    pub async fn finalize(
        &self,
        identity: Identity,
        session_id: TestSessionId,
    ) -> Result<TestResult, TestError> {
        let session = self.load_for(identity, session_id).await?;
        let now = self.clock.now();

        if session.is_completed() {
            if self.recorder.is_recorded(session_id).await? {
                return Err(TestError::AlreadyCompleted);
            }
            tracing::warn!(session = %session_id, "completed test has no result; recording it");
        } else {
            let ended_at = now.max(session.started_at());
            match self.sessions.complete_session(session_id, ended_at).await {
                Ok(SessionWrite::Applied) => {}
                Ok(SessionWrite::AlreadyCompleted) => {
                    tracing::warn!(session = %session_id, "lost finalize race");
                    return Err(TestError::AlreadyCompleted);
                }
                Err(StorageError::NotFound) => return Err(TestError::SessionNotFound),
                Err(e) => return Err(e.into()),
            }
        }

        // Reload: answers recorded before the claim are now frozen.
        let completed = self.sessions.get_session(session_id).await?;
        let card = ScoreCard::from_completed(&completed)?;
        tracing::info!(
            session = %session_id,
            score = card.score,
            total = card.total_questions,
            elapsed_secs = card.elapsed_seconds,
            "test finalized"
        );

        match self.recorder.record(&completed, &card, now).await {
            // A concurrent recovery stored the result first.
            Err(TestError::Conflict) => Err(TestError::AlreadyCompleted),
            other => other,
        }
    }

    async fn load_for(
        &self,
        identity: Identity,
        session_id: TestSessionId,
    ) -> Result<TestSession, TestError> {
        let session = match self.sessions.get_session(session_id).await {
            Ok(session) => session,
            Err(StorageError::NotFound) => return Err(TestError::SessionNotFound),
            Err(e) => return Err(e.into()),
        };
        if !identity.can_access(session.user_id()) {
            return Err(TestError::Unauthorized);
        }
        Ok(session)
    }
}
