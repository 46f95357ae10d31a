use placement_core::model::{
    Category, CategoryBreakdown, Difficulty, Question, QuestionId, QuestionRef, QuestionSource,
    ResultDraft, ResultId, SessionEntry, TestResult, TestSessionId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps a unique-constraint violation to `Conflict`; everything else is a connection error.
pub(crate) fn conflict_or_conn(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<TestSessionId, StorageError> {
    Ok(TestSessionId::new(i64_to_u64("session_id", v)?))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

fn result_id_from_i64(v: i64) -> Result<ResultId, StorageError> {
    Ok(ResultId::new(i64_to_u64("result_id", v)?))
}

pub(crate) fn parse_category(s: &str) -> Result<Category, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    s.parse().map_err(ser)
}

/// Options are stored as a JSON array to keep their order.
pub(crate) fn options_to_json(options: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

fn options_from_json(raw: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let source = row
        .try_get::<Option<String>, _>("source")
        .map_err(ser)?
        .map(|s| s.parse::<QuestionSource>().map_err(ser))
        .transpose()?;

    Question::from_persisted(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        parse_category(&row.try_get::<String, _>("category").map_err(ser)?)?,
        parse_difficulty(&row.try_get::<String, _>("difficulty").map_err(ser)?)?,
        row.try_get::<String, _>("question_text").map_err(ser)?,
        options_from_json(&row.try_get::<String, _>("options").map_err(ser)?)?,
        row.try_get::<String, _>("correct_answer").map_err(ser)?,
        source,
    )
    .map_err(ser)
}

pub(crate) fn map_question_ref_row(row: &SqliteRow) -> Result<QuestionRef, StorageError> {
    Ok(QuestionRef {
        id: question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        category: parse_category(&row.try_get::<String, _>("category").map_err(ser)?)?,
        difficulty: parse_difficulty(&row.try_get::<String, _>("difficulty").map_err(ser)?)?,
    })
}

pub(crate) fn map_entry_row(row: &SqliteRow) -> Result<SessionEntry, StorageError> {
    let question = QuestionRef {
        id: question_id_from_i64(row.try_get::<i64, _>("question_id").map_err(ser)?)?,
        category: parse_category(&row.try_get::<String, _>("category").map_err(ser)?)?,
        difficulty: parse_difficulty(&row.try_get::<String, _>("difficulty").map_err(ser)?)?,
    };
    let answer: Option<String> = row.try_get("answer").map_err(ser)?;
    let is_correct = row
        .try_get::<Option<i64>, _>("is_correct")
        .map_err(ser)?
        .map(|v| v != 0);

    SessionEntry::from_persisted(question, answer, is_correct).map_err(ser)
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<TestResult, StorageError> {
    let count = |field: &'static str| -> Result<u32, StorageError> {
        u32_from_i64(field, row.try_get::<i64, _>(field).map_err(ser)?)
    };

    let category_breakdown = CategoryBreakdown {
        mathematics: count("mathematics_correct")?,
        reasoning: count("reasoning_correct")?,
        technical: count("technical_correct")?,
        database: count("database_correct")?,
    };
    let elapsed_i64: i64 = row.try_get("elapsed_seconds").map_err(ser)?;
    let elapsed_seconds = u64::try_from(elapsed_i64).map_err(|_| {
        StorageError::Serialization(format!("invalid elapsed_seconds: {elapsed_i64}"))
    })?;

    let draft = ResultDraft::new(
        user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
        session_id_from_i64(row.try_get::<i64, _>("session_id").map_err(ser)?)?,
        count("score")?,
        count("total_questions")?,
        elapsed_seconds,
        category_breakdown,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)?;

    Ok(draft.assign_id(result_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?))
}
