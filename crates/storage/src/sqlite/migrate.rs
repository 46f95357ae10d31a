use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the question bank, test sessions with their entries, results, and
/// the indexes that back bucket sampling and the one-open-session rule.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY,
                    category TEXT NOT NULL
                        CHECK (category IN ('Mathematics', 'Reasoning', 'Technical', 'Database')),
                    difficulty TEXT NOT NULL
                        CHECK (difficulty IN ('Easy', 'Medium', 'Hard')),
                    question_text TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_answer TEXT NOT NULL,
                    source TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS test_sessions (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    duration_secs INTEGER NOT NULL CHECK (duration_secs >= 0),
                    completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1))
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS test_session_entries (
                    session_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    question_id INTEGER NOT NULL,
                    category TEXT NOT NULL,
                    difficulty TEXT NOT NULL,
                    answer TEXT,
                    is_correct INTEGER CHECK (is_correct IN (0, 1)),
                    PRIMARY KEY (session_id, position),
                    UNIQUE (session_id, question_id),
                    FOREIGN KEY (session_id) REFERENCES test_sessions(id) ON DELETE CASCADE,
                    FOREIGN KEY (question_id) REFERENCES questions(id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS results (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    session_id INTEGER NOT NULL UNIQUE,
                    score INTEGER NOT NULL CHECK (score >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= score),
                    elapsed_seconds INTEGER NOT NULL CHECK (elapsed_seconds >= 0),
                    mathematics_correct INTEGER NOT NULL CHECK (mathematics_correct >= 0),
                    reasoning_correct INTEGER NOT NULL CHECK (reasoning_correct >= 0),
                    technical_correct INTEGER NOT NULL CHECK (technical_correct >= 0),
                    database_correct INTEGER NOT NULL CHECK (database_correct >= 0),
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (session_id) REFERENCES test_sessions(id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_questions_bucket
                    ON questions(category, difficulty);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE UNIQUE INDEX IF NOT EXISTS idx_test_sessions_one_open
                    ON test_sessions(user_id) WHERE completed = 0;
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_results_user_created
                    ON results(user_id, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
