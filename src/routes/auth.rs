use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use validator::Validate;

use crate::dto::auth_dto::{LoginRequest, RefreshRequest, RegisterRequest, RoomLoginRequest};
use crate::AppState;

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let user = state.auth_service.register(payload).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let (user, tokens) = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(json!({
        "user": user,
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
    }))
    .into_response())
}

#[axum::debug_handler]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> crate::error::Result<Response> {
    let tokens = state.auth_service.refresh(&payload.refresh_token).await?;
    Ok(Json(tokens).into_response())
}

#[axum::debug_handler]
pub async fn room_login(
    State(state): State<AppState>,
    Json(payload): Json<RoomLoginRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let response = state.auth_service.room_login(payload).await?;
    Ok(Json(response).into_response())
}
