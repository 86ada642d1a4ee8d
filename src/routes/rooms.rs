use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::room_dto::{CreateRoomRequest, JoinRoomRequest};
use crate::middleware::auth::Claims;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRoomRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let room = state
        .room_service
        .create_room(claims.sub, &payload.title)
        .await?;
    Ok((StatusCode::CREATED, Json(room)).into_response())
}

#[axum::debug_handler]
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> crate::error::Result<Response> {
    let rooms = state.room_service.list_owned(claims.sub).await?;
    Ok(Json(rooms).into_response())
}

#[axum::debug_handler]
pub async fn get_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    claims.ensure_room_scope(room_id)?;
    let room = state
        .room_service
        .room_for_viewer(room_id, claims.sub)
        .await?;
    Ok(Json(room).into_response())
}

#[axum::debug_handler]
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    state.room_service.delete_room(room_id, claims.sub).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[axum::debug_handler]
pub async fn join_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<JoinRoomRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let room = state
        .room_service
        .join_by_code(&payload.code, claims.sub)
        .await?;
    Ok(Json(room).into_response())
}

#[axum::debug_handler]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    claims.ensure_room_scope(room_id)?;
    state
        .room_service
        .room_for_viewer(room_id, claims.sub)
        .await?;
    let members = state.room_service.list_members(room_id).await?;
    Ok(Json(members).into_response())
}
