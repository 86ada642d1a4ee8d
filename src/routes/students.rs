use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::students_dto::{
    AddStudentRequest, AssignStudentsRequest, CreateGroupRequest, DeleteGroupQuery,
    UpdateGroupRequest,
};
use crate::middleware::auth::Claims;
use crate::services::students_service::GroupDeleteMode;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_students(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let students = state.students_service.list_students(subject_id).await?;
    Ok(Json(students).into_response())
}

#[axum::debug_handler]
pub async fn add_student(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(subject_id): Path<Uuid>,
    Json(payload): Json<AddStudentRequest>,
) -> crate::error::Result<Response> {
    let membership = state
        .students_service
        .add_student(subject_id, claims.sub, payload.student_id)
        .await?;
    Ok((StatusCode::CREATED, Json(membership)).into_response())
}

#[axum::debug_handler]
pub async fn remove_student(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((subject_id, student_id)): Path<(Uuid, Uuid)>,
) -> crate::error::Result<Response> {
    state
        .students_service
        .remove_student(subject_id, claims.sub, student_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(subject_id): Path<Uuid>,
    Json(payload): Json<CreateGroupRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let group = state
        .students_service
        .create_group(subject_id, claims.sub, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(group)).into_response())
}

#[axum::debug_handler]
pub async fn list_groups(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let groups = state.students_service.list_groups(subject_id).await?;
    Ok(Json(groups).into_response())
}

#[axum::debug_handler]
pub async fn rename_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<UpdateGroupRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let group = state
        .students_service
        .rename_group(group_id, claims.sub, &payload.name)
        .await?;
    Ok(Json(group).into_response())
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<DeleteGroupQuery>,
) -> crate::error::Result<Response> {
    let mode = GroupDeleteMode::parse(query.mode.as_deref())?;
    state
        .students_service
        .delete_group(group_id, claims.sub, mode)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn assign_students(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<AssignStudentsRequest>,
) -> crate::error::Result<Response> {
    let updated = state
        .students_service
        .assign_students(group_id, claims.sub, &payload.student_ids)
        .await?;
    Ok(Json(updated).into_response())
}

#[axum::debug_handler]
pub async fn remove_from_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((group_id, student_id)): Path<(Uuid, Uuid)>,
) -> crate::error::Result<Response> {
    state
        .students_service
        .remove_from_group(group_id, claims.sub, student_id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn subject_stats(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let stats = state.students_service.subject_stats(subject_id).await?;
    Ok(Json(stats).into_response())
}

#[axum::debug_handler]
pub async fn group_stats(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let stats = state.students_service.group_stats(subject_id).await?;
    Ok(Json(stats).into_response())
}
