use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::content_dto::ReorderRequest;
use crate::dto::quiz_dto::{
    CreateOptionRequest, CreateQuestionRequest, CreateQuizRequest, SubmitAttemptRequest,
    UpdateOptionRequest, UpdateQuestionRequest, UpdateQuizRequest,
};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<Uuid>,
    Json(payload): Json<CreateQuizRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let quiz = state
        .quiz_service
        .create_quiz(lesson_id, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(quiz)).into_response())
}

#[axum::debug_handler]
pub async fn list_quizzes(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let quizzes = state.quiz_service.list_quizzes(lesson_id).await?;
    Ok(Json(quizzes).into_response())
}

#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let (quiz, questions) = state.quiz_service.get_quiz_with_questions(quiz_id).await?;
    Ok(Json(json!({ "quiz": quiz, "questions": questions })).into_response())
}

#[axum::debug_handler]
pub async fn update_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<UpdateQuizRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let quiz = state
        .quiz_service
        .update_quiz(quiz_id, claims.sub, payload)
        .await?;
    Ok(Json(quiz).into_response())
}

#[axum::debug_handler]
pub async fn publish_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let quiz = state
        .quiz_service
        .set_published(quiz_id, claims.sub, true)
        .await?;
    Ok(Json(quiz).into_response())
}

#[axum::debug_handler]
pub async fn delete_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state.quiz_service.delete_quiz(quiz_id, claims.sub).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<CreateQuestionRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let question = state
        .quiz_service
        .create_question(quiz_id, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(question)).into_response())
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let question = state
        .quiz_service
        .update_question(question_id, claims.sub, payload)
        .await?;
    Ok(Json(question).into_response())
}

#[axum::debug_handler]
pub async fn delete_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state
        .quiz_service
        .delete_question(question_id, claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn reorder_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> crate::error::Result<Response> {
    let questions = state
        .quiz_service
        .reorder_questions(quiz_id, claims.sub, &payload.ordered_ids)
        .await?;
    Ok(Json(questions).into_response())
}

#[axum::debug_handler]
pub async fn create_option(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<CreateOptionRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let option = state
        .quiz_service
        .create_option(question_id, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(option)).into_response())
}

#[axum::debug_handler]
pub async fn update_option(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(option_id): Path<Uuid>,
    Json(payload): Json<UpdateOptionRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let option = state
        .quiz_service
        .update_option(option_id, claims.sub, payload)
        .await?;
    Ok(Json(option).into_response())
}

#[axum::debug_handler]
pub async fn delete_option(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(option_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state
        .quiz_service
        .delete_option(option_id, claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn reorder_options(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> crate::error::Result<Response> {
    let options = state
        .quiz_service
        .reorder_options(question_id, claims.sub, &payload.ordered_ids)
        .await?;
    Ok(Json(options).into_response())
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> crate::error::Result<Response> {
    let result = state
        .attempt_service
        .submit(quiz_id, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state
        .quiz_service
        .ensure_quiz_authority(quiz_id, claims.sub)
        .await?;
    let attempts = state.attempt_service.list_for_quiz(quiz_id).await?;
    Ok(Json(attempts).into_response())
}

#[axum::debug_handler]
pub async fn list_my_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let attempts = state
        .attempt_service
        .list_for_user(quiz_id, claims.sub)
        .await?;
    Ok(Json(attempts).into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let attempt = state
        .attempt_service
        .get_attempt(attempt_id, claims.sub)
        .await?;
    Ok(Json(attempt).into_response())
}
