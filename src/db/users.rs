// src/db/users.rs

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db::db_error,
    error::AppError,
    models::user::{NewUser, User},
};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, created_at, updated_at";

pub async fn insert(conn: &mut SqliteConnection, user: &NewUser<'_>) -> Result<User, AppError> {
    let now = Utc::now();
    let created = sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, email, password_hash, role, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, 1, ?, ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.username)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.role)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("Failed to create user"))?;

    tracing::info!("User created: {}", created.username);
    Ok(created)
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to fetch user"))
}

pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?"))
        .bind(username)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to fetch user"))
}

pub async fn find_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to fetch user"))
}

pub async fn set_active(
    conn: &mut SqliteConnection,
    id: i64,
    is_active: bool,
) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to update user"))?;

    Ok(result.rows_affected() > 0)
}

/// Hard delete; owned tests, questions and attempts go with it through the foreign keys.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to delete user"))?;

    Ok(result.rows_affected() > 0)
}
