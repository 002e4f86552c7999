// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{LoginRequest, LoginResponse, RegisterRequest},
    services::auth::{get_user, login_user, register_user},
    state::AppState,
    utils::{
        jwt::{Claims, sign_jwt},
        rate_limit::Action,
    },
};

/// Registers a new teacher or student.
///
/// Returns 201 Created and the user object (excluding the password hash).
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    state.check_rate(Action::Register, payload.username.trim())?;

    let user = register_user(
        &state.pool,
        &payload.username,
        &payload.email,
        &payload.password,
        &payload.role,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// Unknown users, inactive users and wrong passwords get the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    state.check_rate(Action::Login, payload.username.trim())?;

    let user = login_user(&state.pool, &payload.username, &payload.password)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

    let token = sign_jwt(
        user.id,
        &user.username,
        user.role,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        user,
    }))
}

/// Returns the account behind the current token.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = get_user(&state.pool, claims.user_id()?).await?;
    Ok(Json(user))
}
