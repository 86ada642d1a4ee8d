use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::content_dto::{CreateModuleRequest, ReorderRequest, UpdateModuleRequest};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_module(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(subject_id): Path<Uuid>,
    Json(payload): Json<CreateModuleRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let module = state
        .content_service
        .create_module(subject_id, claims.sub, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(module)).into_response())
}

#[axum::debug_handler]
pub async fn list_modules(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let modules = state.content_service.list_modules(subject_id).await?;
    Ok(Json(modules).into_response())
}

#[axum::debug_handler]
pub async fn update_module(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<Uuid>,
    Json(payload): Json<UpdateModuleRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let module = state
        .content_service
        .update_module(module_id, claims.sub, payload)
        .await?;
    Ok(Json(module).into_response())
}

#[axum::debug_handler]
pub async fn delete_module(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state
        .content_service
        .delete_module(module_id, claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn reorder_modules(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(subject_id): Path<Uuid>,
    Json(payload): Json<ReorderRequest>,
) -> crate::error::Result<Response> {
    let modules = state
        .content_service
        .reorder_modules(subject_id, claims.sub, &payload.ordered_ids)
        .await?;
    Ok(Json(modules).into_response())
}
