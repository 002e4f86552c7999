// src/handlers/generate.rs

//! AI wizard: draft a batch of questions, then save the reviewed batch as a test.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::generation::{GenerateQuestionsRequest, SaveGeneratedRequest},
    services::{authoring, generator},
    state::AppState,
    utils::{jwt::Claims, rate_limit::Action},
};

/// Returns the screened questions without storing anything.
pub async fn generate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    state.check_rate(Action::AiGenerate, &claims.sub)?;

    let questions =
        generator::generate_questions(state.provider.as_deref(), &state.retry_policy, &payload)
            .await?;

    Ok(Json(json!({
        "requested": payload.num_questions,
        "count": questions.len(),
        "questions": questions,
    })))
}

pub async fn save(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SaveGeneratedRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    state.check_rate(Action::AiSave, &claims.sub)?;

    let detail = authoring::save_generated_test(&state.pool, claims.user_id()?, &payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}
