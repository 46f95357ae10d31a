//! Shared error types for the services crate.

use thiserror::Error;

use placement_core::model::{QuestionError, QuestionId, ResultError, TestSessionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Coarse classification of service errors for callers that map them onto
/// status codes or exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyCompleted,
    Conflict,
    Unauthorized,
    Invalid,
    Internal,
}

/// Errors emitted by `TestService` and `ResultRecorder`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestError {
    #[error("test session not found")]
    SessionNotFound,
    #[error("question {0} is not part of this test")]
    QuestionNotInSession(QuestionId),
    #[error("not allowed to access this test")]
    Unauthorized,
    #[error("test already completed")]
    AlreadyCompleted,
    #[error("a result already exists for this test")]
    Conflict,
    #[error("question bank has no questions for any bucket")]
    EmptyBank,
    #[error(transparent)]
    Session(#[from] TestSessionError),
    #[error(transparent)]
    Result(#[from] ResultError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TestError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            TestError::SessionNotFound | TestError::QuestionNotInSession(_) => ErrorKind::NotFound,
            TestError::Unauthorized => ErrorKind::Unauthorized,
            TestError::AlreadyCompleted | TestError::Session(TestSessionError::AlreadyCompleted) => {
                ErrorKind::AlreadyCompleted
            }
            TestError::Conflict => ErrorKind::Conflict,
            TestError::EmptyBank => ErrorKind::Invalid,
            TestError::Storage(e) => storage_kind(e),
            TestError::Session(_) | TestError::Result(_) => ErrorKind::Internal,
        }
    }
}

/// Errors emitted by `ResultService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResultServiceError {
    #[error("result not found")]
    NotFound,
    #[error("not allowed to access this result")]
    Unauthorized,
    #[error("test has not been completed")]
    NotCompleted,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResultServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResultServiceError::NotFound => ErrorKind::NotFound,
            ResultServiceError::Unauthorized => ErrorKind::Unauthorized,
            ResultServiceError::NotCompleted => ErrorKind::Invalid,
            ResultServiceError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by `QuestionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error("only admins may manage questions")]
    Unauthorized,
    #[error("question not found")]
    NotFound,
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error("question #{index} is invalid: {source}")]
    InvalidImport {
        index: usize,
        #[source]
        source: QuestionError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QuestionServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuestionServiceError::Unauthorized => ErrorKind::Unauthorized,
            QuestionServiceError::NotFound => ErrorKind::NotFound,
            QuestionServiceError::Question(_) | QuestionServiceError::InvalidImport { .. } => {
                ErrorKind::Invalid
            }
            QuestionServiceError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

fn storage_kind(e: &StorageError) -> ErrorKind {
    match e {
        StorageError::NotFound => ErrorKind::NotFound,
        StorageError::Conflict => ErrorKind::Conflict,
        _ => ErrorKind::Internal,
    }
}
