// src/handlers/student.rs

//! Student routes: find a test, take it, and review past attempts.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::attempt::{ImprovementQuery, SubmitAttemptRequest},
    services::{attempts, authoring},
    state::AppState,
    utils::jwt::Claims,
};

/// Catalogue of published tests.
pub async fn list_published(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tests = authoring::published_tests(&state.pool).await?;
    Ok(Json(tests))
}

pub async fn find_by_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let test = authoring::get_test_by_key(&state.pool, &key).await?;
    Ok(Json(test))
}

/// Returns the questions without answers plus the `started_at` to echo back on submit.
pub async fn start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = attempts::start_attempt(&state.pool, id, claims.user_id()?).await?;
    Ok(Json(snapshot))
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = attempts::submit_attempt(
        &state.pool,
        id,
        claims.user_id()?,
        &payload.answers,
        payload.started_at,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let history = attempts::student_attempts(&state.pool, claims.user_id()?).await?;
    Ok(Json(history))
}

pub async fn attempt_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let results = attempts::get_attempt_results(&state.pool, id, claims.user_id()?).await?;
    Ok(Json(results))
}

pub async fn improvement(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ImprovementQuery>,
) -> Result<impl IntoResponse, AppError> {
    let report =
        attempts::calculate_improvement(&state.pool, claims.user_id()?, query.pre, query.post)
            .await?;
    Ok(Json(report))
}
