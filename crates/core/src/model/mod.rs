mod identity;
mod ids;
mod question;
mod result;
mod session;

pub use ids::{ParseIdError, QuestionId, ResultId, TestSessionId, UserId};

pub use identity::{Identity, Role};
pub use question::{
    Category, Difficulty, MIN_OPTIONS, Question, QuestionDraft, QuestionError, QuestionRef,
    QuestionSource, ValidatedQuestion,
};
pub use result::{CategoryBreakdown, ResultDraft, ResultError, TestResult};
pub use session::{NewTestSession, SessionEntry, TestSession, TestSessionError};
