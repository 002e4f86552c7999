// src/db/questions.rs

use chrono::Utc;
use sqlx::{SqliteConnection, types::Json};

use crate::{
    db::db_error,
    error::AppError,
    models::question::{NewQuestion, Question},
};

const QUESTION_COLUMNS: &str = "id, test_id, question_text, options, correct_answer, explanation, \
     topic_tag, difficulty, display_order, created_at";

/// A clash on `(test_id, display_order)` comes back as `AppError::Conflict`.
pub async fn insert(
    conn: &mut SqliteConnection,
    test_id: i64,
    question: &NewQuestion,
    order: i64,
) -> Result<Question, AppError> {
    let created = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO questions
            (test_id, question_text, options, correct_answer, explanation, topic_tag, difficulty, display_order, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(test_id)
    .bind(&question.question_text)
    .bind(Json(&question.options))
    .bind(question.correct_answer)
    .bind(question.explanation.as_deref())
    .bind(question.topic_tag.as_deref())
    .bind(question.difficulty)
    .bind(order)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("Failed to create question"))?;

    tracing::info!("Question created id={} test_id={}", created.id, test_id);
    Ok(created)
}

/// Next free display position: one past the current maximum, or 0 for an empty test.
pub async fn next_order(conn: &mut SqliteConnection, test_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(MAX(display_order) + 1, 0) FROM questions WHERE test_id = ?",
    )
    .bind(test_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("Failed to compute question order"))
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Question>, AppError> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("Failed to fetch question"))
}

/// In display order.
pub async fn list_by_test(
    conn: &mut SqliteConnection,
    test_id: i64,
) -> Result<Vec<Question>, AppError> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE test_id = ? ORDER BY display_order ASC"
    ))
    .bind(test_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to list questions"))
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to delete question"))?;

    let success = result.rows_affected() > 0;
    tracing::info!("Question deleted id={} success={}", id, success);
    Ok(success)
}
