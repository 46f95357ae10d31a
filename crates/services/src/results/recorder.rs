use std::sync::Arc;

use chrono::{DateTime, Utc};
use placement_core::model::{TestResult, TestSession, TestSessionId};
use placement_core::scoring::ScoreCard;
use storage::repository::{ResultRepository, StorageError};

use crate::error::TestError;

/// Persists exactly one result per completed session.
#[derive(Clone)]
pub struct ResultRecorder {
    results: Arc<dyn ResultRepository>,
}

impl ResultRecorder {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>) -> Self {
        Self { results }
    }

    /// Whether a result already exists for the session.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Storage` if the lookup fails.
    pub async fn is_recorded(&self, session_id: TestSessionId) -> Result<bool, TestError> {
        Ok(self.results.result_for_session(session_id).await?.is_some())
    }

    /// Store the score card of `session` as its result.
    ///
    /// # Errors
    ///
    /// Returns `TestError::Conflict` if the session already has a result,
    /// `TestError::Result` if the card is inconsistent, and
    /// `TestError::Storage` for other persistence failures.
    pub async fn record(
        &self,
        session: &TestSession,
        card: &ScoreCard,
        recorded_at: DateTime<Utc>,
    ) -> Result<TestResult, TestError> {
        let draft = card.to_result(session, recorded_at)?;
        let result = match self.results.insert_result(&draft).await {
            Ok(result) => result,
            Err(StorageError::Conflict) => {
                tracing::warn!(session = %session.id(), "result already recorded for session");
                return Err(TestError::Conflict);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            result = %result.id(),
            session = %session.id(),
            user = %session.user_id(),
            score = result.score(),
            total = result.total_questions(),
            "result recorded"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement_core::model::{NewTestSession, UserId};
    use placement_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn second_record_for_a_session_conflicts() {
        let repo = InMemoryRepository::new();
        let recorder = ResultRecorder::new(Arc::new(repo.clone()));

        let mut session = NewTestSession::new(UserId::new(1), Vec::new(), fixed_now(), 7_200)
            .assign_id(TestSessionId::new(1));
        session.complete(fixed_now()).unwrap();
        let card = ScoreCard::from_completed(&session).unwrap();

        assert!(!recorder.is_recorded(session.id()).await.unwrap());
        let first = recorder.record(&session, &card, fixed_now()).await.unwrap();
        assert!(recorder.is_recorded(session.id()).await.unwrap());
        assert_eq!(first.session_id(), session.id());
        assert!(matches!(
            recorder.record(&session, &card, fixed_now()).await,
            Err(TestError::Conflict)
        ));
        assert_eq!(repo.list_results(10).await.unwrap().len(), 1);
    }
}
