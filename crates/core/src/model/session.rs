use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::ids::{QuestionId, TestSessionId, UserId};
use crate::model::question::{Category, Difficulty, QuestionRef};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestSessionError {
    #[error("test session already completed")]
    AlreadyCompleted,

    #[error("test session is still in progress")]
    NotCompleted,

    #[error("question {0} is not part of this test session")]
    UnknownEntry(QuestionId),

    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("invalid persisted test session: {0}")]
    InvalidPersistedState(String),
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// One question slot within a test session.
///
/// Category and difficulty are captured when the session is generated so that
/// scoring never has to go back to the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    question_id: QuestionId,
    category: Category,
    difficulty: Difficulty,
    answer: Option<String>,
    is_correct: Option<bool>,
}

impl SessionEntry {
    #[must_use]
    pub fn new(question: QuestionRef) -> Self {
        Self {
            question_id: question.id,
            category: question.category,
            difficulty: question.difficulty,
            answer: None,
            is_correct: None,
        }
    }

    /// Rehydrate an entry from storage.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError::InvalidPersistedState` when only one of
    /// answer and correctness is present.
    pub fn from_persisted(
        question: QuestionRef,
        answer: Option<String>,
        is_correct: Option<bool>,
    ) -> Result<Self, TestSessionError> {
        if answer.is_some() != is_correct.is_some() {
            return Err(TestSessionError::InvalidPersistedState(format!(
                "entry {} has answer without grade",
                question.id
            )));
        }
        Ok(Self {
            question_id: question.id,
            category: question.category,
            difficulty: question.difficulty,
            answer,
            is_correct,
        })
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    /// Correctness recorded at submission time; `None` until answered.
    #[must_use]
    pub fn graded(&self) -> Option<bool> {
        self.is_correct
    }

    /// Unanswered entries never earn credit.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct.unwrap_or(false)
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// A generated test that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTestSession {
    pub user_id: UserId,
    pub entries: Vec<SessionEntry>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u32,
}

impl NewTestSession {
    #[must_use]
    pub fn new(
        user_id: UserId,
        questions: impl IntoIterator<Item = QuestionRef>,
        started_at: DateTime<Utc>,
        duration_secs: u32,
    ) -> Self {
        Self {
            user_id,
            entries: questions.into_iter().map(SessionEntry::new).collect(),
            started_at,
            duration_secs,
        }
    }

    #[must_use]
    pub fn assign_id(self, id: TestSessionId) -> TestSession {
        TestSession {
            id,
            user_id: self.user_id,
            entries: self.entries,
            started_at: self.started_at,
            ended_at: None,
            duration_secs: self.duration_secs,
            completed: false,
        }
    }
}

/// One user's instance of a generated question set.
///
/// The entry list is fixed at creation; only answers and the completion state
/// change afterwards, and completion is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSession {
    id: TestSessionId,
    user_id: UserId,
    entries: Vec<SessionEntry>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    duration_secs: u32,
    completed: bool,
}

impl TestSession {
    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError::InvalidPersistedState` if the completed flag and
    /// end time disagree, or `TestSessionError::InvalidTimeRange` if the session
    /// ends before it starts.
    pub fn from_persisted(
        id: TestSessionId,
        user_id: UserId,
        entries: Vec<SessionEntry>,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        duration_secs: u32,
        completed: bool,
    ) -> Result<Self, TestSessionError> {
        if completed != ended_at.is_some() {
            return Err(TestSessionError::InvalidPersistedState(format!(
                "session {id}: completed={completed} but ended_at present={}",
                ended_at.is_some()
            )));
        }
        if ended_at.is_some_and(|end| end < started_at) {
            return Err(TestSessionError::InvalidTimeRange);
        }
        Ok(Self {
            id,
            user_id,
            entries,
            started_at,
            ended_at,
            duration_secs,
            completed,
        })
    }

    #[must_use]
    pub fn id(&self) -> TestSessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Advisory deadline; nothing enforces it.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(i64::from(self.duration_secs))
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_answered()).count()
    }

    #[must_use]
    pub fn entry(&self, question_id: QuestionId) -> Option<&SessionEntry> {
        self.entries.iter().find(|e| e.question_id == question_id)
    }

    /// Store an answer and its grade on the matching entry. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError::AlreadyCompleted` once the session is completed,
    /// or `TestSessionError::UnknownEntry` if the question is not in the session.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        answer: impl Into<String>,
        is_correct: bool,
    ) -> Result<(), TestSessionError> {
        if self.completed {
            return Err(TestSessionError::AlreadyCompleted);
        }
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.question_id == question_id)
            .ok_or(TestSessionError::UnknownEntry(question_id))?;
        entry.answer = Some(answer.into());
        entry.is_correct = Some(is_correct);
        Ok(())
    }

    /// Mark the session completed. The end time is clamped to the start time.
    ///
    /// # Errors
    ///
    /// Returns `TestSessionError::AlreadyCompleted` if it was completed before.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), TestSessionError> {
        if self.completed {
            return Err(TestSessionError::AlreadyCompleted);
        }
        self.completed = true;
        self.ended_at = Some(at.max(self.started_at));
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn qref(id: u64, category: Category) -> QuestionRef {
        QuestionRef {
            id: QuestionId::new(id),
            category,
            difficulty: Difficulty::Easy,
        }
    }

    fn build_session() -> TestSession {
        NewTestSession::new(
            UserId::new(1),
            vec![
                qref(1, Category::Mathematics),
                qref(2, Category::Reasoning),
                qref(3, Category::Database),
            ],
            fixed_now(),
            7_200,
        )
        .assign_id(TestSessionId::new(10))
    }

    #[test]
    fn new_session_is_open_and_unanswered() {
        let session = build_session();
        assert!(!session.is_completed());
        assert_eq!(session.ended_at(), None);
        assert_eq!(session.total_questions(), 3);
        assert_eq!(session.answered_count(), 0);
        assert!(session.entries().iter().all(|e| e.graded().is_none()));
        assert_eq!(
            session.expires_at(),
            fixed_now() + Duration::seconds(7_200)
        );
    }

    #[test]
    fn answers_overwrite_previous_submission() {
        let mut session = build_session();
        session
            .record_answer(QuestionId::new(2), "A", false)
            .unwrap();
        session.record_answer(QuestionId::new(2), "B", true).unwrap();

        let entry = session.entry(QuestionId::new(2)).unwrap();
        assert_eq!(entry.answer(), Some("B"));
        assert!(entry.is_correct());
        assert_eq!(session.answered_count(), 1);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut session = build_session();
        let err = session
            .record_answer(QuestionId::new(99), "A", true)
            .unwrap_err();
        assert_eq!(err, TestSessionError::UnknownEntry(QuestionId::new(99)));
    }

    #[test]
    fn completion_is_terminal() {
        let mut session = build_session();
        let before = session.clone();
        session.complete(fixed_now() + Duration::minutes(5)).unwrap();
        assert!(session.is_completed());

        assert_eq!(
            session.complete(fixed_now()).unwrap_err(),
            TestSessionError::AlreadyCompleted
        );
        let err = session
            .record_answer(QuestionId::new(1), "A", true)
            .unwrap_err();
        assert_eq!(err, TestSessionError::AlreadyCompleted);
        assert_eq!(session.entries(), before.entries());
    }

    #[test]
    fn completion_clamps_end_time_to_start() {
        let mut session = build_session();
        session.complete(fixed_now() - Duration::seconds(30)).unwrap();
        assert_eq!(session.ended_at(), Some(fixed_now()));
    }

    #[test]
    fn persisted_state_must_be_consistent() {
        let err = TestSession::from_persisted(
            TestSessionId::new(1),
            UserId::new(1),
            Vec::new(),
            fixed_now(),
            None,
            7_200,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, TestSessionError::InvalidPersistedState(_)));

        let err = TestSession::from_persisted(
            TestSessionId::new(1),
            UserId::new(1),
            Vec::new(),
            fixed_now(),
            Some(fixed_now() - Duration::seconds(1)),
            7_200,
            true,
        )
        .unwrap_err();
        assert_eq!(err, TestSessionError::InvalidTimeRange);

        let err =
            SessionEntry::from_persisted(qref(1, Category::Technical), Some("A".into()), None)
                .unwrap_err();
        assert!(matches!(err, TestSessionError::InvalidPersistedState(_)));
    }
}
