use chrono::{DateTime, Utc};
use serde::Serialize;

use placement_core::model::{
    Category, Difficulty, Question, QuestionId, SessionEntry, TestSession, TestSessionId, UserId,
};

/// Outcome of recording a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerVerdict {
    pub session_id: TestSessionId,
    pub question_id: QuestionId,
    pub is_correct: bool,
}

/// One entry of a test as shown to the test taker.
///
/// Never carries the correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub number: usize,
    pub question_id: QuestionId,
    pub category: Category,
    pub difficulty: Difficulty,
    pub text: String,
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub answered: bool,
}

impl QuestionView {
    fn from_entry(number: usize, entry: &SessionEntry, question: &Question) -> Self {
        Self {
            number,
            question_id: entry.question_id(),
            category: entry.category(),
            difficulty: entry.difficulty(),
            text: question.text().to_owned(),
            options: question.options().to_vec(),
            answer: entry.answer().map(str::to_owned),
            answered: entry.is_answered(),
        }
    }
}

/// One row of the administrator's session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: TestSessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub total_questions: usize,
    pub answered_count: usize,
}

impl From<&TestSession> for SessionSummary {
    fn from(session: &TestSession) -> Self {
        Self {
            session_id: session.id(),
            user_id: session.user_id(),
            started_at: session.started_at(),
            ended_at: session.ended_at(),
            completed: session.is_completed(),
            total_questions: session.total_questions(),
            answered_count: session.answered_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPage {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub sessions: Vec<SessionSummary>,
}

/// Session metadata plus the per-entry projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsView {
    pub session_id: TestSessionId,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u32,
    pub expires_at: DateTime<Utc>,
    pub completed: bool,
    pub total_questions: usize,
    pub answered_count: usize,
    pub questions: Vec<QuestionView>,
}

impl QuestionsView {
    /// Pair each entry with its question. `questions` must follow entry order.
    pub(crate) fn build(session: &TestSession, questions: &[Question]) -> Self {
        let views = session
            .entries()
            .iter()
            .zip(questions)
            .enumerate()
            .map(|(i, (entry, question))| QuestionView::from_entry(i + 1, entry, question))
            .collect();

        Self {
            session_id: session.id(),
            started_at: session.started_at(),
            duration_secs: session.duration_secs(),
            expires_at: session.expires_at(),
            completed: session.is_completed(),
            total_questions: session.total_questions(),
            answered_count: session.answered_count(),
            questions: views,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::model::{NewTestSession, QuestionDraft, QuestionRef, UserId};
    use placement_core::time::fixed_now;

    fn question(id: u64) -> Question {
        QuestionDraft {
            category: Category::Technical,
            difficulty: Difficulty::Hard,
            question_text: format!("Question {id}"),
            options: vec!["O(n)".into(), "O(log n)".into()],
            correct_answer: "O(log n)".into(),
            source: None,
        }
        .validate()
        .unwrap()
        .assign_id(QuestionId::new(id))
    }

    #[test]
    fn view_numbers_entries_and_hides_the_answer_key() {
        let questions = vec![question(1), question(2)];
        let refs: Vec<_> = questions.iter().map(QuestionRef::from).collect();
        let mut session = NewTestSession::new(UserId::new(1), refs, fixed_now(), 7_200)
            .assign_id(TestSessionId::new(10));
        session
            .record_answer(QuestionId::new(2), "O(n)", false)
            .unwrap();

        let view = QuestionsView::build(&session, &questions);
        assert_eq!(view.total_questions, 2);
        assert_eq!(view.answered_count, 1);
        assert_eq!(view.questions[0].number, 1);
        assert!(!view.questions[0].answered);
        assert_eq!(view.questions[1].answer.as_deref(), Some("O(n)"));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.to_string().contains("\"answeredCount\":1"));
        assert!(!json.to_string().contains("correct"));
    }
}
