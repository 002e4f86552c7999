// src/services/auth.rs

use sqlx::SqlitePool;

use crate::{
    db,
    error::AppError,
    models::user::{NewUser, Role, User},
    utils::{
        hash::{hash_password, verify_password},
        validators::{validate_email, validate_password, validate_username},
    },
};

/// Registers a teacher or student.
///
/// All checks and the insert share one transaction, so a failure leaves nothing behind.
/// Username and email uniqueness is case-sensitive, exactly as the UNIQUE columns compare.
pub async fn register_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<User, AppError> {
    let username = validate_username(username)?;
    let email = validate_email(email)?;
    validate_password(password)?;
    let role: Role = role.parse()?;

    let mut tx = db::begin(pool).await?;

    if db::users::find_by_username(&mut tx, &username).await?.is_some() {
        return Err(AppError::validation("Username already exists"));
    }
    if db::users::find_by_email(&mut tx, &email).await?.is_some() {
        return Err(AppError::validation("Email already exists"));
    }

    let password_hash = hash_password(password)?;
    let user = db::users::insert(
        &mut tx,
        &NewUser {
            username: &username,
            email: &email,
            password_hash: &password_hash,
            role,
        },
    )
    .await
    .map_err(|e| match e {
        // lost a race with a concurrent registration
        AppError::Conflict(_) => AppError::validation("Username or email already exists"),
        other => other,
    })?;

    db::commit(tx).await?;

    tracing::info!("User registered username={} role={}", user.username, user.role);
    Ok(user)
}

/// Checks credentials. Unknown user, inactive user and wrong password all yield
/// `Ok(None)`, so callers cannot tell them apart. Only persistence failures are errors.
pub async fn login_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let mut conn = pool.acquire().await?;

    let Some(user) = db::users::find_by_username(&mut conn, username.trim()).await? else {
        tracing::warn!("Login failed: user not found username={}", username);
        return Ok(None);
    };
    if !user.is_active {
        tracing::warn!("Login failed: inactive user username={}", username);
        return Ok(None);
    }
    if !verify_password(password, &user.password_hash) {
        tracing::warn!("Login failed: invalid password username={}", username);
        return Ok(None);
    }

    tracing::info!("Login success username={}", user.username);
    Ok(Some(user))
}

/// Enables or disables login for a user without deleting anything they own.
pub async fn set_user_active(
    pool: &SqlitePool,
    user_id: i64,
    is_active: bool,
) -> Result<(), AppError> {
    let mut tx = db::begin(pool).await?;
    if !db::users::set_active(&mut tx, user_id, is_active).await? {
        return Err(AppError::validation("User not found"));
    }
    db::commit(tx).await?;

    tracing::info!("User active flag changed id={} active={}", user_id, is_active);
    Ok(())
}

/// Removes a user and, through the foreign keys, every test and attempt they own.
pub async fn delete_user(pool: &SqlitePool, user_id: i64) -> Result<bool, AppError> {
    let mut tx = db::begin(pool).await?;
    let deleted = db::users::delete(&mut tx, user_id).await?;
    db::commit(tx).await?;
    Ok(deleted)
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<User, AppError> {
    let mut conn = pool.acquire().await?;
    db::users::find_by_id(&mut conn, user_id)
        .await?
        .ok_or_else(|| AppError::validation("User not found"))
}
