use placement_core::model::{ResultDraft, ResultId, TestResult, TestSessionId, UserId};

use super::SqliteRepository;
use super::mapping::{conflict_or_conn, conn, id_i64, map_result_row, ser};
use crate::repository::{ResultRepository, StorageError};

const RESULT_COLUMNS: &str = r"
    id, user_id, session_id, score, total_questions, elapsed_seconds,
    mathematics_correct, reasoning_correct, technical_correct, database_correct,
    created_at
";

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn insert_result(&self, draft: &ResultDraft) -> Result<TestResult, StorageError> {
        let breakdown = draft.category_breakdown();

        // `session_id` is UNIQUE: a second result for the same session is a conflict.
        let res = sqlx::query(
            r"
            INSERT INTO results (
                user_id, session_id, score, total_questions, elapsed_seconds,
                mathematics_correct, reasoning_correct, technical_correct, database_correct,
                created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(id_i64("user_id", draft.user_id().value())?)
        .bind(id_i64("session_id", draft.session_id().value())?)
        .bind(i64::from(draft.score()))
        .bind(i64::from(draft.total_questions()))
        .bind(id_i64("elapsed_seconds", draft.elapsed_seconds())?)
        .bind(i64::from(breakdown.mathematics))
        .bind(i64::from(breakdown.reasoning))
        .bind(i64::from(breakdown.technical))
        .bind(i64::from(breakdown.database))
        .bind(draft.created_at())
        .execute(&self.pool)
        .await
        .map_err(conflict_or_conn)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(draft.clone().assign_id(ResultId::new(id)))
    }

    async fn get_result(&self, id: ResultId) -> Result<TestResult, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM results WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("result_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }

    async fn result_for_session(
        &self,
        session_id: TestSessionId,
    ) -> Result<Option<TestResult>, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM results WHERE session_id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("session_id", session_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_result_row).transpose()
    }

    async fn list_user_results(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TestResult>, StorageError> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM results
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("user_id", user_id.value())?)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_result_row).collect()
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<TestResult>, StorageError> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM results
             ORDER BY created_at DESC, id DESC
             LIMIT ?1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_result_row).collect()
    }
}
