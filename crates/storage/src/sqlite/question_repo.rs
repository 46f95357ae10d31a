use std::collections::HashMap;

use placement_core::model::{
    Category, Difficulty, Question, QuestionId, QuestionRef, ValidatedQuestion,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, id_i64, map_question_ref_row, map_question_row, options_to_json, parse_category,
    parse_difficulty, question_id_from_i64, ser,
};
use crate::repository::{
    BucketCount, Page, Paged, QuestionFilter, QuestionRepository, StorageError,
};

const INSERT_QUESTION: &str = r"
    INSERT INTO questions (category, difficulty, question_text, options, correct_answer, source)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let res = sqlx::query(INSERT_QUESTION)
            .bind(question.category.as_str())
            .bind(question.difficulty.as_str())
            .bind(question.text.as_str())
            .bind(options_to_json(&question.options)?)
            .bind(question.correct_answer.as_str())
            .bind(question.source.map(|s| s.as_str()))
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        question_id_from_i64(res.last_insert_rowid())
    }

    async fn insert_questions(
        &self,
        questions: &[ValidatedQuestion],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut ids = Vec::with_capacity(questions.len());

        for question in questions {
            let res = sqlx::query(INSERT_QUESTION)
                .bind(question.category.as_str())
                .bind(question.difficulty.as_str())
                .bind(question.text.as_str())
                .bind(options_to_json(&question.options)?)
                .bind(question.correct_answer.as_str())
                .bind(question.source.map(|s| s.as_str()))
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            ids.push(question_id_from_i64(res.last_insert_rowid())?);
        }

        tx.commit().await.map_err(conn)?;
        Ok(ids)
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, category, difficulty, question_text, options, correct_answer, source
            FROM questions
            WHERE id = ?1
            ",
        )
        .bind(id_i64("question_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_question_row(&row)
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
            SELECT id, category, difficulty, question_text, options, correct_answer, source
            FROM questions
            WHERE id IN (
            ",
        );
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(")\n");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id_i64("question_id", id.value())?);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;

        let mut by_id: HashMap<QuestionId, Question> = HashMap::with_capacity(rows.len());
        for row in rows {
            let question = map_question_row(&row)?;
            by_id.insert(question.id(), question);
        }

        ids.iter()
            .map(|id| by_id.get(id).cloned().ok_or(StorageError::NotFound))
            .collect()
    }

    async fn list_questions(
        &self,
        filter: QuestionFilter,
        page: Page,
    ) -> Result<Paged<Question>, StorageError> {
        let category = filter.category.map(Category::as_str);
        let difficulty = filter.difficulty.map(Difficulty::as_str);

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM questions
            WHERE (?1 IS NULL OR category = ?1)
              AND (?2 IS NULL OR difficulty = ?2)
            ",
        )
        .bind(category)
        .bind(difficulty)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let rows = sqlx::query(
            r"
            SELECT id, category, difficulty, question_text, options, correct_answer, source
            FROM questions
            WHERE (?1 IS NULL OR category = ?1)
              AND (?2 IS NULL OR difficulty = ?2)
            ORDER BY category ASC, difficulty ASC, id ASC
            LIMIT ?3 OFFSET ?4
            ",
        )
        .bind(category)
        .bind(difficulty)
        .bind(i64::from(page.size()))
        .bind(id_i64("offset", page.offset())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        Ok(Paged {
            items: rows.iter().map(map_question_row).collect::<Result<_, _>>()?,
            total: u64::try_from(total).map_err(ser)?,
        })
    }

    async fn correct_answer(&self, id: QuestionId) -> Result<String, StorageError> {
        let row = sqlx::query("SELECT correct_answer FROM questions WHERE id = ?1")
            .bind(id_i64("question_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        row.try_get("correct_answer").map_err(ser)
    }

    async fn sample(
        &self,
        category: Category,
        difficulty: Difficulty,
        count: u32,
    ) -> Result<Vec<QuestionRef>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, category, difficulty
            FROM questions
            WHERE category = ?1 AND difficulty = ?2
            ORDER BY RANDOM()
            LIMIT ?3
            ",
        )
        .bind(category.as_str())
        .bind(difficulty.as_str())
        .bind(i64::from(count))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_ref_row).collect()
    }

    async fn bucket_counts(&self) -> Result<Vec<BucketCount>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT category, difficulty, COUNT(*) AS n
            FROM questions
            GROUP BY category, difficulty
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let n: i64 = row.try_get("n").map_err(ser)?;
            out.push(BucketCount {
                category: parse_category(&row.try_get::<String, _>("category").map_err(ser)?)?,
                difficulty: parse_difficulty(
                    &row.try_get::<String, _>("difficulty").map_err(ser)?,
                )?,
                count: u64::try_from(n).map_err(ser)?,
            });
        }
        out.sort_by_key(|b| (b.category, b.difficulty));
        Ok(out)
    }
}
