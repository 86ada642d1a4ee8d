use crate::error::{Error, Result};
use crate::middleware::auth::{decode_token, Claims, TOKEN_KIND_ACCESS};
use crate::ws::channels::ChatEvent;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Browsers cannot set headers on WebSocket upgrades, so the bearer token
/// travels as a query parameter instead.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

fn authenticate(token: &str) -> Result<Claims> {
    let claims =
        decode_token(token).map_err(|_| Error::Unauthorized("invalid_token".to_string()))?;
    if claims.kind != TOKEN_KIND_ACCESS {
        return Err(Error::Unauthorized("invalid_token".to_string()));
    }
    Ok(claims)
}

pub async fn session_ws(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let claims = authenticate(&query.token)?;
    let session = state
        .chat_service
        .session_for_viewer(session_id, claims.sub)
        .await?;
    claims.ensure_room_scope(session.room_id)?;

    let tx = state.channels.session_channel(session_id);
    let user_id = claims.sub;
    Ok(ws.on_upgrade(move |socket| relay(socket, tx, user_id)))
}

pub async fn room_ws(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let claims = authenticate(&query.token)?;
    claims.ensure_room_scope(room_id)?;
    state
        .room_service
        .room_for_viewer(room_id, claims.sub)
        .await?;

    let tx = state.channels.room_channel(room_id);
    let user_id = claims.sub;
    Ok(ws.on_upgrade(move |socket| relay(socket, tx, user_id)))
}

/// Bridges one socket onto a broadcast channel. Mutations never happen here;
/// incoming frames are only inspected for typing signals, which are relayed
/// to the other subscribers without touching the database.
async fn relay(socket: WebSocket, tx: broadcast::Sender<String>, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = tx.subscribe();

    if let Ok(payload) = serde_json::to_string(&ChatEvent::Joined { user_id }) {
        let _ = tx.send(payload);
    }

    let tx_in = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                    continue;
                };
                if value.get("event").and_then(|v| v.as_str()) == Some("typing") {
                    if let Ok(payload) = serde_json::to_string(&ChatEvent::Typing { user_id }) {
                        let _ = tx_in.send(payload);
                    }
                }
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if sender.send(Message::Text(msg)).await.is_err() {
                        break;
                    }
                }
                // A slow viewer skips what it missed but stays connected.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }
}
