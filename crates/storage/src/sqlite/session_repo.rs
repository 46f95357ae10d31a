use chrono::{DateTime, Utc};
use placement_core::model::{
    NewTestSession, QuestionId, TestSession, TestSessionId, UserId,
};
use sqlx::{Row, SqlitePool};

use super::SqliteRepository;
use super::mapping::{
    conflict_or_conn, conn, id_i64, map_entry_row, ser, session_id_from_i64, u32_from_i64,
    user_id_from_i64,
};
use crate::repository::{Page, Paged, SessionWrite, StorageError, TestSessionRepository};

async fn fetch_session(
    pool: &SqlitePool,
    id: TestSessionId,
) -> Result<Option<TestSession>, StorageError> {
    let session_id = id_i64("session_id", id.value())?;

    let Some(row) = sqlx::query(
        r"
        SELECT id, user_id, started_at, ended_at, duration_secs, completed
        FROM test_sessions
        WHERE id = ?1
        ",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .map_err(conn)?
    else {
        return Ok(None);
    };

    let entry_rows = sqlx::query(
        r"
        SELECT question_id, category, difficulty, answer, is_correct
        FROM test_session_entries
        WHERE session_id = ?1
        ORDER BY position ASC
        ",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .map_err(conn)?;

    let entries = entry_rows
        .iter()
        .map(map_entry_row)
        .collect::<Result<Vec<_>, _>>()?;

    let session = TestSession::from_persisted(
        session_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        entries,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("ended_at").map_err(ser)?,
        u32_from_i64(
            "duration_secs",
            row.try_get::<i64, _>("duration_secs").map_err(ser)?,
        )?,
        row.try_get::<i64, _>("completed").map_err(ser)? != 0,
    )
    .map_err(ser)?;

    Ok(Some(session))
}

/// Explains why a conditional write touched no rows.
async fn diagnose_write(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<SessionWrite, StorageError> {
    let completed: Option<i64> =
        sqlx::query_scalar("SELECT completed FROM test_sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(pool)
            .await
            .map_err(conn)?;

    match completed {
        // Open session but the entry is missing.
        None | Some(0) => Err(StorageError::NotFound),
        Some(_) => Ok(SessionWrite::AlreadyCompleted),
    }
}

#[async_trait::async_trait]
impl TestSessionRepository for SqliteRepository {
    async fn insert_session(&self, session: &NewTestSession) -> Result<TestSession, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        // The partial unique index on open sessions rejects a second open test.
        let res = sqlx::query(
            r"
            INSERT INTO test_sessions (user_id, started_at, ended_at, duration_secs, completed)
            VALUES (?1, ?2, NULL, ?3, 0)
            ",
        )
        .bind(id_i64("user_id", session.user_id.value())?)
        .bind(session.started_at)
        .bind(i64::from(session.duration_secs))
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_conn)?;

        let rowid = res.last_insert_rowid();
        for (position, entry) in session.entries.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO test_session_entries (
                    session_id, position, question_id, category, difficulty, answer, is_correct
                )
                VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL)
                ",
            )
            .bind(rowid)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(id_i64("question_id", entry.question_id().value())?)
            .bind(entry.category().as_str())
            .bind(entry.difficulty().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conflict_or_conn)?;
        }

        tx.commit().await.map_err(conn)?;

        Ok(session.clone().assign_id(session_id_from_i64(rowid)?))
    }

    async fn get_session(&self, id: TestSessionId) -> Result<TestSession, StorageError> {
        fetch_session(&self.pool, id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn find_open_session(
        &self,
        user_id: UserId,
    ) -> Result<Option<TestSession>, StorageError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM test_sessions WHERE user_id = ?1 AND completed = 0",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match id {
            Some(id) => fetch_session(&self.pool, session_id_from_i64(id)?).await,
            None => Ok(None),
        }
    }

    async fn list_sessions(
        &self,
        completed: Option<bool>,
        page: Page,
    ) -> Result<Paged<TestSession>, StorageError> {
        let completed = completed.map(i64::from);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM test_sessions WHERE (?1 IS NULL OR completed = ?1)",
        )
        .bind(completed)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let ids: Vec<i64> = sqlx::query_scalar(
            r"
            SELECT id
            FROM test_sessions
            WHERE (?1 IS NULL OR completed = ?1)
            ORDER BY started_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(completed)
        .bind(i64::from(page.size()))
        .bind(id_i64("offset", page.offset())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(session) = fetch_session(&self.pool, session_id_from_i64(id)?).await? {
                items.push(session);
            }
        }

        Ok(Paged {
            items,
            total: u64::try_from(total).map_err(ser)?,
        })
    }

    async fn record_answer(
        &self,
        id: TestSessionId,
        question_id: QuestionId,
        answer: &str,
        is_correct: bool,
    ) -> Result<SessionWrite, StorageError> {
        let session_id = id_i64("session_id", id.value())?;

        // Single statement: the open check and the write cannot interleave with completion.
        let res = sqlx::query(
            r"
            UPDATE test_session_entries
            SET answer = ?3, is_correct = ?4
            WHERE session_id = ?1
              AND question_id = ?2
              AND EXISTS (
                  SELECT 1 FROM test_sessions WHERE id = ?1 AND completed = 0
              )
            ",
        )
        .bind(session_id)
        .bind(id_i64("question_id", question_id.value())?)
        .bind(answer)
        .bind(i64::from(is_correct))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 1 {
            return Ok(SessionWrite::Applied);
        }
        diagnose_write(&self.pool, session_id).await
    }

    async fn complete_session(
        &self,
        id: TestSessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionWrite, StorageError> {
        let session_id = id_i64("session_id", id.value())?;

        let res = sqlx::query(
            r"
            UPDATE test_sessions
            SET completed = 1, ended_at = ?2
            WHERE id = ?1 AND completed = 0
            ",
        )
        .bind(session_id)
        .bind(ended_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 1 {
            return Ok(SessionWrite::Applied);
        }
        diagnose_write(&self.pool, session_id).await
    }
}
