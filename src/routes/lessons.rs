use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::content_dto::{CreateLessonRequest, ReorderRequest, UpdateLessonRequest};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<Uuid>,
    Json(payload): Json<CreateLessonRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let lesson = state
        .content_service
        .create_lesson(module_id, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)).into_response())
}

#[axum::debug_handler]
pub async fn list_lessons(
    State(state): State<AppState>,
    Path(module_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let lessons = state.content_service.list_lessons(module_id).await?;
    Ok(Json(lessons).into_response())
}

#[axum::debug_handler]
pub async fn get_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let lesson = state.content_service.get_lesson(lesson_id).await?;
    Ok(Json(lesson).into_response())
}

#[axum::debug_handler]
pub async fn update_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<Uuid>,
    Json(payload): Json<UpdateLessonRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let lesson = state
        .content_service
        .update_lesson(lesson_id, claims.sub, payload)
        .await?;
    Ok(Json(lesson).into_response())
}

#[axum::debug_handler]
pub async fn delete_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state
        .content_service
        .delete_lesson(lesson_id, claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn reorder_lessons(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> crate::error::Result<Response> {
    let lessons = state
        .content_service
        .reorder_lessons(module_id, claims.sub, &payload.ordered_ids)
        .await?;
    Ok(Json(lessons).into_response())
}
