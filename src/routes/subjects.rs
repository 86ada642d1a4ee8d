use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::content_dto::{CreateSubjectRequest, UpdateSubjectRequest};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_subject(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSubjectRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let subject = state
        .content_service
        .create_subject(claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(subject)).into_response())
}

#[axum::debug_handler]
pub async fn list_subjects(State(state): State<AppState>) -> crate::error::Result<Response> {
    let subjects = state.content_service.list_subjects().await?;
    Ok(Json(subjects).into_response())
}

#[axum::debug_handler]
pub async fn get_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let subject = state.content_service.get_subject(subject_id).await?;
    Ok(Json(subject).into_response())
}

#[axum::debug_handler]
pub async fn update_subject(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(subject_id): Path<Uuid>,
    Json(payload): Json<UpdateSubjectRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let subject = state
        .content_service
        .update_subject(subject_id, claims.sub, payload)
        .await?;
    Ok(Json(subject).into_response())
}

#[axum::debug_handler]
pub async fn delete_subject(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(subject_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state
        .content_service
        .delete_subject(subject_id, claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
