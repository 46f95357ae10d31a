#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod question_service;
pub mod results;
pub mod seed;
pub mod sessions;

pub use placement_core::Clock;
pub use storage::repository::{Page, QuestionFilter};

pub use app_services::AppServices;
pub use error::{AppServicesError, ErrorKind, QuestionServiceError, ResultServiceError, TestError};
pub use question_service::{
    BankStats, BucketStats, CategoryCount, QuestionDetail, QuestionPage, QuestionService,
};
pub use results::{
    CategoryAccuracy, PerformanceStats, QuestionAnalysis, ResultRecorder, ResultService,
    ResultSummary, TestAnalysis,
};
pub use sessions::{
    AnswerVerdict, QuestionView, QuestionsView, SessionPage, SessionSummary, TestService,
};
