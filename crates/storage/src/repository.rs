use async_trait::async_trait;
use chrono::{DateTime, Utc};
use placement_core::model::{
    Category, Difficulty, NewTestSession, Question, QuestionId, QuestionRef, ResultDraft,
    ResultId, TestResult, TestSession, TestSessionError, TestSessionId, UserId,
    ValidatedQuestion,
};
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Outcome of a write that only applies to an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionWrite {
    Applied,
    AlreadyCompleted,
}

/// Inventory of one (category, difficulty) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketCount {
    pub category: Category,
    pub difficulty: Difficulty,
    pub count: u64,
}

/// Optional bucket narrowing for question listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
}

impl QuestionFilter {
    #[must_use]
    pub fn matches(&self, question: &Question) -> bool {
        self.category.is_none_or(|c| c == question.category())
            && self.difficulty.is_none_or(|d| d == question.difficulty())
    }
}

/// One-based page window over a listing. Zero values are raised to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u32,
    size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

impl Page {
    #[must_use]
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Rows skipped before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }

    fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.size).unwrap_or(usize::MAX);
        rows.into_iter().skip(skip).take(take).collect()
    }
}

/// A page of rows plus the number of rows matching overall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Question bank contract.
///
/// The correct answer is exposed through its own method so grading never has
/// to hand a full question to the session layer.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Store a validated question and assign its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn insert_question(&self, question: &ValidatedQuestion)
    -> Result<QuestionId, StorageError>;

    /// Store a batch of questions; either all are stored or none are.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be stored.
    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// Fetch questions by IDs, in the order requested.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any are missing, or other storage errors.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// Questions matching `filter`, ordered by category name, difficulty
    /// name, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be queried.
    async fn list_questions(
        &self,
        filter: QuestionFilter,
        page: Page,
    ) -> Result<Paged<Question>, StorageError>;

    /// Fetch only the correct answer of a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn correct_answer(&self, id: QuestionId) -> Result<String, StorageError>;

    /// Draw up to `count` questions of one bucket uniformly at random without
    /// replacement. Returns every match when fewer than `count` exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be queried.
    async fn sample(
        &self,
        category: Category,
        difficulty: Difficulty,
        count: u32,
    ) -> Result<Vec<QuestionRef>, StorageError>;

    /// Number of questions in every non-empty bucket.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bank cannot be queried.
    async fn bucket_counts(&self) -> Result<Vec<BucketCount>, StorageError>;
}

/// Durable storage for test sessions.
///
/// Every mutating method is atomic per session.
#[async_trait]
pub trait TestSessionRepository: Send + Sync {
    /// Persist a freshly generated session and assign its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has an open session.
    async fn insert_session(&self, session: &NewTestSession) -> Result<TestSession, StorageError>;

    /// Fetch a session with all of its entries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: TestSessionId) -> Result<TestSession, StorageError>;

    /// The user's session with `completed = false`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn find_open_session(&self, user_id: UserId)
    -> Result<Option<TestSession>, StorageError>;

    /// Sessions of every user, newest first, optionally narrowed to
    /// completed or open ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn list_sessions(
        &self,
        completed: Option<bool>,
        page: Page,
    ) -> Result<Paged<TestSession>, StorageError>;

    /// Store an answer and its grade, only while the session is open.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session or the entry is missing.
    async fn record_answer(
        &self,
        id: TestSessionId,
        question_id: QuestionId,
        answer: &str,
        is_correct: bool,
    ) -> Result<SessionWrite, StorageError>;

    /// Flip the session to completed. Exactly one caller can succeed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is missing.
    async fn complete_session(
        &self,
        id: TestSessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionWrite, StorageError>;
}

/// Append-only storage for results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Persist a result and assign its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the session already has a result.
    async fn insert_result(&self, result: &ResultDraft) -> Result<TestResult, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: ResultId) -> Result<TestResult, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn result_for_session(
        &self,
        session_id: TestSessionId,
    ) -> Result<Option<TestResult>, StorageError>;

    /// Results of one user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn list_user_results(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TestResult>, StorageError>;

    /// Results of all users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be queried.
    async fn list_results(&self, limit: u32) -> Result<Vec<TestResult>, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

struct Table<K, V> {
    rows: BTreeMap<K, V>,
    last_id: u64,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<K, V> Table<K, V> {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

fn newest_first(mut results: Vec<TestResult>, limit: u32) -> Vec<TestResult> {
    results.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
    results.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    results
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Each table sits behind its own mutex, which serialises every
/// read-modify-write on a session.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<Table<QuestionId, Question>>>,
    sessions: Arc<Mutex<Table<TestSessionId, TestSession>>>,
    results: Arc<Mutex<Table<ResultId, TestResult>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let mut guard = lock(&self.questions)?;
        let id = QuestionId::new(guard.next_id());
        guard.rows.insert(id, question.clone().assign_id(id));
        Ok(id)
    }

    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut guard = lock(&self.questions)?;
        let mut ids = Vec::with_capacity(questions.len());
        for question in questions {
            let id = QuestionId::new(guard.next_id());
            guard.rows.insert(id, question.clone().assign_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let guard = lock(&self.questions)?;
        guard.rows.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = lock(&self.questions)?;
        ids.iter()
            .map(|id| guard.rows.get(id).cloned().ok_or(StorageError::NotFound))
            .collect()
    }

    async fn list_questions(
        &self,
        filter: QuestionFilter,
        page: Page,
    ) -> Result<Paged<Question>, StorageError> {
        let mut matching: Vec<Question> = {
            let guard = lock(&self.questions)?;
            guard
                .rows
                .values()
                .filter(|q| filter.matches(q))
                .cloned()
                .collect()
        };
        matching.sort_by(|a, b| {
            (a.category().as_str(), a.difficulty().as_str(), a.id()).cmp(&(
                b.category().as_str(),
                b.difficulty().as_str(),
                b.id(),
            ))
        });
        Ok(Paged {
            total: u64::try_from(matching.len()).unwrap_or(u64::MAX),
            items: page.slice(matching),
        })
    }

    async fn correct_answer(&self, id: QuestionId) -> Result<String, StorageError> {
        let guard = lock(&self.questions)?;
        guard
            .rows
            .get(&id)
            .map(|q| q.correct_answer().to_owned())
            .ok_or(StorageError::NotFound)
    }

    async fn sample(
        &self,
        category: Category,
        difficulty: Difficulty,
        count: u32,
    ) -> Result<Vec<QuestionRef>, StorageError> {
        let mut matching: Vec<QuestionRef> = {
            let guard = lock(&self.questions)?;
            guard
                .rows
                .values()
                .filter(|q| q.category() == category && q.difficulty() == difficulty)
                .map(QuestionRef::from)
                .collect()
        };

        let mut rng = rng();
        matching.as_mut_slice().shuffle(&mut rng);
        matching.truncate(usize::try_from(count).unwrap_or(usize::MAX));
        Ok(matching)
    }

    async fn bucket_counts(&self) -> Result<Vec<BucketCount>, StorageError> {
        let guard = lock(&self.questions)?;
        let mut counts: BTreeMap<(Category, Difficulty), u64> = BTreeMap::new();
        for q in guard.rows.values() {
            *counts.entry((q.category(), q.difficulty())).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((category, difficulty), count)| BucketCount {
                category,
                difficulty,
                count,
            })
            .collect())
    }
}

#[async_trait]
impl TestSessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &NewTestSession) -> Result<TestSession, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let has_open = guard
            .rows
            .values()
            .any(|s| s.user_id() == session.user_id && !s.is_completed());
        if has_open {
            return Err(StorageError::Conflict);
        }
        let id = TestSessionId::new(guard.next_id());
        let stored = session.clone().assign_id(id);
        guard.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_session(&self, id: TestSessionId) -> Result<TestSession, StorageError> {
        let guard = lock(&self.sessions)?;
        guard.rows.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn find_open_session(
        &self,
        user_id: UserId,
    ) -> Result<Option<TestSession>, StorageError> {
        let guard = lock(&self.sessions)?;
        Ok(guard
            .rows
            .values()
            .find(|s| s.user_id() == user_id && !s.is_completed())
            .cloned())
    }

    async fn list_sessions(
        &self,
        completed: Option<bool>,
        page: Page,
    ) -> Result<Paged<TestSession>, StorageError> {
        let mut matching: Vec<TestSession> = {
            let guard = lock(&self.sessions)?;
            guard
                .rows
                .values()
                .filter(|s| completed.is_none_or(|c| c == s.is_completed()))
                .cloned()
                .collect()
        };
        matching.sort_by(|a, b| {
            b.started_at()
                .cmp(&a.started_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(Paged {
            total: u64::try_from(matching.len()).unwrap_or(u64::MAX),
            items: page.slice(matching),
        })
    }

    async fn record_answer(
        &self,
        id: TestSessionId,
        question_id: QuestionId,
        answer: &str,
        is_correct: bool,
    ) -> Result<SessionWrite, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let session = guard.rows.get_mut(&id).ok_or(StorageError::NotFound)?;
        match session.record_answer(question_id, answer, is_correct) {
            Ok(()) => Ok(SessionWrite::Applied),
            Err(TestSessionError::AlreadyCompleted) => Ok(SessionWrite::AlreadyCompleted),
            Err(TestSessionError::UnknownEntry(_)) => Err(StorageError::NotFound),
            Err(e) => Err(StorageError::Serialization(e.to_string())),
        }
    }

    async fn complete_session(
        &self,
        id: TestSessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionWrite, StorageError> {
        let mut guard = lock(&self.sessions)?;
        let session = guard.rows.get_mut(&id).ok_or(StorageError::NotFound)?;
        match session.complete(ended_at) {
            Ok(()) => Ok(SessionWrite::Applied),
            Err(TestSessionError::AlreadyCompleted) => Ok(SessionWrite::AlreadyCompleted),
            Err(e) => Err(StorageError::Serialization(e.to_string())),
        }
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn insert_result(&self, result: &ResultDraft) -> Result<TestResult, StorageError> {
        let mut guard = lock(&self.results)?;
        if guard
            .rows
            .values()
            .any(|r| r.session_id() == result.session_id())
        {
            return Err(StorageError::Conflict);
        }
        let id = ResultId::new(guard.next_id());
        let stored = result.clone().assign_id(id);
        guard.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get_result(&self, id: ResultId) -> Result<TestResult, StorageError> {
        let guard = lock(&self.results)?;
        guard.rows.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn result_for_session(
        &self,
        session_id: TestSessionId,
    ) -> Result<Option<TestResult>, StorageError> {
        let guard = lock(&self.results)?;
        Ok(guard
            .rows
            .values()
            .find(|r| r.session_id() == session_id)
            .cloned())
    }

    async fn list_user_results(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TestResult>, StorageError> {
        let all: Vec<TestResult> = {
            let guard = lock(&self.results)?;
            guard
                .rows
                .values()
                .filter(|r| r.user_id() == user_id)
                .cloned()
                .collect()
        };
        Ok(newest_first(all, limit))
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<TestResult>, StorageError> {
        let all: Vec<TestResult> = {
            let guard = lock(&self.results)?;
            guard.rows.values().cloned().collect()
        };
        Ok(newest_first(all, limit))
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub sessions: Arc<dyn TestSessionRepository>,
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn TestSessionRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self {
            questions,
            sessions,
            results,
        }
    }
}
