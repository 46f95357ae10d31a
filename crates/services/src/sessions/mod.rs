mod plan;
mod service;
mod view;

// Public API of the test session engine.
pub use crate::error::TestError;
pub use plan::{ShortBucket, TestPlan};
pub use service::TestService;
pub use view::{AnswerVerdict, QuestionView, QuestionsView, SessionPage, SessionSummary};
