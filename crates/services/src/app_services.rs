use std::sync::Arc;

use placement_core::catalog::TestBlueprint;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::question_service::QuestionService;
use crate::results::ResultService;
use crate::sessions::TestService;

/// Assembles the services a front end needs over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    tests: Arc<TestService>,
    results: Arc<ResultService>,
    questions: Arc<QuestionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if connecting or migrating fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, TestBlueprint::default()))
    }

    /// Build services over an existing storage handle.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, blueprint: TestBlueprint) -> Self {
        let tests = TestService::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.results),
        )
        .with_blueprint(blueprint);
        let results = ResultService::new(
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.results),
        );
        let questions =
            QuestionService::new(Arc::clone(&storage.questions)).with_blueprint(blueprint);

        Self {
            tests: Arc::new(tests),
            results: Arc::new(results),
            questions: Arc::new(questions),
        }
    }

    #[must_use]
    pub fn tests(&self) -> Arc<TestService> {
        Arc::clone(&self.tests)
    }

    #[must_use]
    pub fn results(&self) -> Arc<ResultService> {
        Arc::clone(&self.results)
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionService> {
        Arc::clone(&self.questions)
    }
}
