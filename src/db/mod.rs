// src/db/mod.rs

//! Persistence layer: pool setup plus one CRUD module per table.
//!
//! CRUD functions take a `&mut SqliteConnection` so services can run several of
//! them inside one transaction. Driver errors never cross this boundary: they are
//! logged here and replaced by `AppError::Database`, or `AppError::Conflict` for
//! uniqueness violations.

pub mod attempts;
pub mod questions;
pub mod users;

use std::time::Duration;

use sqlx::{
    Sqlite, SqlitePool, Transaction,
    sqlite::SqlitePoolOptions,
};

use crate::error::AppError;

/// Opens the pool, retrying while the database file or volume is not yet available.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Single-connection in-memory database with the schema applied.
///
/// The connection is never recycled, since closing it would drop the database.
pub async fn in_memory() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;
    Ok(pool)
}

pub async fn begin(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, AppError> {
    pool.begin()
        .await
        .map_err(db_error("Failed to open transaction"))
}

pub async fn commit(tx: Transaction<'static, Sqlite>) -> Result<(), AppError> {
    tx.commit()
        .await
        .map_err(db_error("Failed to commit transaction"))
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// Builds the `map_err` closure used on every query: logs the driver error and
/// returns a context-only `AppError`.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        if is_unique_violation(&err) {
            tracing::warn!("{}: unique constraint violated: {}", context, err);
            AppError::Conflict(context.to_string())
        } else {
            tracing::error!("{}: {:?}", context, err);
            AppError::Database(context.to_string())
        }
    }
}
