mod recorder;
mod reporting;

pub use crate::error::ResultServiceError;
pub use recorder::ResultRecorder;
pub use reporting::{
    CategoryAccuracy, PerformanceStats, QuestionAnalysis, RECENT_RESULTS, ResultService,
    ResultSummary, TestAnalysis,
};
