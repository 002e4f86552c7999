// src/handlers/tests.rs

//! Teacher-side test management. Every route here sits behind `teacher_middleware`.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::CreateQuestionRequest,
        test::{CreateTestRequest, TestUpdate},
    },
    services::{attempts, authoring},
    state::AppState,
    utils::jwt::Claims,
};

fn edit_policy(state: &AppState) -> authoring::EditPolicy {
    authoring::EditPolicy {
        allow_edits_after_publish: state.config.allow_edits_after_publish,
    }
}

pub async fn list_tests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let tests = authoring::teacher_tests(&state.pool, claims.user_id()?).await?;
    Ok(Json(tests))
}

/// Creates a draft test. The response carries the generated access key.
pub async fn create_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let test = authoring::create_test(
        &state.pool,
        claims.user_id()?,
        &payload.title,
        payload.description.as_deref(),
        &payload.test_type,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(test)))
}

pub async fn update_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<TestUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let test = authoring::update_test_metadata(&state.pool, id, claims.user_id()?, &payload).await?;
    Ok(Json(test))
}

pub async fn delete_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    authoring::delete_test(&state.pool, id, claims.user_id()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = authoring::publish_test(&state.pool, id, claims.user_id()?).await?;
    Ok(Json(test))
}

/// Owner's view: the test with every question, answers included.
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = authoring::test_questions(&state.pool, id, claims.user_id()?).await?;
    Ok(Json(detail))
}

pub async fn add_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question = authoring::add_question(
        &state.pool,
        edit_policy(&state),
        claims.user_id()?,
        id,
        &payload,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn delete_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, qid)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = authoring::delete_question(
        &state.pool,
        edit_policy(&state),
        claims.user_id()?,
        id,
        qid,
    )
    .await?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn analytics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let stats = attempts::test_analytics(&state.pool, id, claims.user_id()?).await?;
    Ok(Json(stats))
}
