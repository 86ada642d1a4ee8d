use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::services::upload_service::{StoredFile, UploadService};
use crate::AppState;

/// Parsed multipart message form: "text", optional repeated "file" parts and,
/// on edit, a comma-separated "remove_attachment_ids" field.
struct MessageForm {
    text: Option<String>,
    remove_attachment_ids: Vec<Uuid>,
    files: Vec<StoredFile>,
}

async fn parse_message_form(mut multipart: Multipart) -> Result<MessageForm> {
    let mut form = MessageForm {
        text: None,
        remove_attachment_ids: Vec::new(),
        files: Vec::new(),
    };

    let outcome: Result<()> = async {
        while let Some(field) = multipart.next_field().await? {
            match field.name() {
                Some("text") => {
                    form.text = Some(field.text().await?);
                }
                Some("remove_attachment_ids") => {
                    let raw = field.text().await?;
                    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                        let id = Uuid::parse_str(part).map_err(|_| {
                            Error::BadRequest(format!("Invalid attachment id: {}", part))
                        })?;
                        form.remove_attachment_ids.push(id);
                    }
                }
                Some("file") => {
                    let file_name = field
                        .file_name()
                        .map(str::to_string)
                        .unwrap_or_else(|| "file".to_string());
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    let stored = UploadService::store(&file_name, content_type, &bytes).await?;
                    form.files.push(stored);
                }
                _ => {}
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = outcome {
        // Files already on disk from earlier parts must not leak.
        UploadService::discard(&form.files).await;
        return Err(e);
    }
    Ok(form)
}

/// Lazily creates the caller's chat session in the room.
#[axum::debug_handler]
pub async fn my_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> Result<Response> {
    claims.ensure_room_scope(room_id)?;
    let session = state
        .chat_service
        .get_or_create_session(room_id, claims.sub)
        .await?;
    Ok(Json(session).into_response())
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> Result<Response> {
    let sessions = state
        .chat_service
        .list_sessions(room_id, claims.sub)
        .await?;
    Ok(Json(sessions).into_response())
}

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<Response> {
    let messages = state
        .chat_service
        .list_messages(session_id, claims.sub)
        .await?;
    Ok(Json(messages).into_response())
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Response> {
    let form = parse_message_form(multipart).await?;
    let Some(text) = form.text else {
        UploadService::discard(&form.files).await;
        return Err(Error::BadRequest("Message text is required".to_string()));
    };
    let message = state
        .chat_service
        .create_session_message(session_id, claims.sub, text, form.files)
        .await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

#[axum::debug_handler]
pub async fn list_room_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> Result<Response> {
    claims.ensure_room_scope(room_id)?;
    let messages = state
        .chat_service
        .list_room_messages(room_id, claims.sub)
        .await?;
    Ok(Json(messages).into_response())
}

#[axum::debug_handler]
pub async fn send_room_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Response> {
    let form = parse_message_form(multipart).await?;
    let Some(text) = form.text else {
        UploadService::discard(&form.files).await;
        return Err(Error::BadRequest("Message text is required".to_string()));
    };
    let message = state
        .chat_service
        .create_room_message(room_id, claims.sub, text, form.files)
        .await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

#[axum::debug_handler]
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Response> {
    let form = parse_message_form(multipart).await?;
    let message = state
        .chat_service
        .edit_message(
            message_id,
            claims.sub,
            form.text,
            form.remove_attachment_ids,
            form.files,
        )
        .await?;
    Ok(Json(message).into_response())
}

#[axum::debug_handler]
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(message_id): Path<Uuid>,
) -> Result<Response> {
    state
        .chat_service
        .delete_message(message_id, claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
