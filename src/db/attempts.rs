// src/db/attempts.rs

use sqlx::{SqliteConnection, types::Json};

use crate::{
    db::db_error,
    error::AppError,
    models::attempt::{Attempt, AttemptSummary, NewAttempt},
};

const ATTEMPT_COLUMNS: &str =
    "id, test_id, student_id, answers, score, time_taken, is_submitted, started_at, completed_at";

/// Writes a finished attempt. There is no update path: attempts are append-only.
pub async fn insert(
    conn: &mut SqliteConnection,
    attempt: &NewAttempt,
) -> Result<Attempt, AppError> {
    let created = sqlx::query_as::<_, Attempt>(&format!(
        r#"
        INSERT INTO attempts
            (test_id, student_id, answers, score, time_taken, is_submitted, started_at, completed_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        RETURNING {ATTEMPT_COLUMNS}
        "#
    ))
    .bind(attempt.test_id)
    .bind(attempt.student_id)
    .bind(Json(&attempt.answers))
    .bind(attempt.score)
    .bind(attempt.time_taken)
    .bind(attempt.started_at)
    .bind(attempt.completed_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("Failed to create attempt"))?;

    tracing::info!("Attempt created id={} score={:.2}", created.id, created.score);
    Ok(created)
}

pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Attempt>, AppError> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("Failed to fetch attempt"))
}

/// A student's history joined with test titles, most recent first.
pub async fn list_by_student(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Vec<AttemptSummary>, AppError> {
    sqlx::query_as::<_, AttemptSummary>(
        r#"
        SELECT
            a.id,
            a.test_id,
            t.title AS test_title,
            t.test_type,
            a.score,
            a.time_taken,
            a.completed_at
        FROM attempts a
        JOIN tests t ON a.test_id = t.id
        WHERE a.student_id = ?
        ORDER BY a.completed_at DESC, a.id DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to list attempts"))
}

pub async fn list_by_test(
    conn: &mut SqliteConnection,
    test_id: i64,
) -> Result<Vec<Attempt>, AppError> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE test_id = ? ORDER BY completed_at DESC, id DESC"
    ))
    .bind(test_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to list attempts"))
}

/// Mean score of one student's attempts at one test, `None` when there are none.
pub async fn average_score(
    conn: &mut SqliteConnection,
    student_id: i64,
    test_id: i64,
) -> Result<Option<f64>, AppError> {
    sqlx::query_scalar::<_, Option<f64>>(
        "SELECT AVG(score) FROM attempts WHERE student_id = ? AND test_id = ?",
    )
    .bind(student_id)
    .bind(test_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("Failed to average scores"))
}
