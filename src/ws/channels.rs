use crate::models::chat::MessageWithAttachments;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events pushed to connected viewers. Serialized shapes mirror the REST
/// responses so both delivery paths converge on the same message list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    MessageCreated(MessageWithAttachments),
    MessageEdited(MessageWithAttachments),
    MessageDeleted { message_id: Uuid },
    Joined { user_id: Uuid },
    Typing { user_id: Uuid },
}

const CHANNEL_CAPACITY: usize = 64;

/// One broadcast channel per chat session and one per room. Channels are
/// created lazily on first use and live for the process lifetime; there is
/// no idle expiry.
#[derive(Clone, Default)]
pub struct ChatChannels {
    sessions: Arc<Mutex<HashMap<Uuid, broadcast::Sender<String>>>>,
    rooms: Arc<Mutex<HashMap<Uuid, broadcast::Sender<String>>>>,
}

impl ChatChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_channel(&self, session_id: Uuid) -> broadcast::Sender<String> {
        let mut guard = self.sessions.lock().expect("session channel map poisoned");
        guard
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn room_channel(&self, room_id: Uuid) -> broadcast::Sender<String> {
        let mut guard = self.rooms.lock().expect("room channel map poisoned");
        guard
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Send errors only mean nobody is listening, which is fine.
    pub fn publish_session(&self, session_id: Uuid, event: &ChatEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = self.session_channel(session_id).send(payload);
        }
    }

    pub fn publish_room(&self, room_id: Uuid, event: &ChatEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = self.room_channel(room_id).send(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_on_the_same_session_receive_published_events() {
        let channels = ChatChannels::new();
        let session_id = Uuid::new_v4();
        let mut rx = channels.session_channel(session_id).subscribe();

        let user_id = Uuid::new_v4();
        channels.publish_session(session_id, &ChatEvent::Typing { user_id });

        let payload = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["event"], "typing");
        assert_eq!(value["data"]["user_id"], user_id.to_string());
    }

    #[tokio::test]
    async fn slow_subscribers_lag_but_stay_subscribed() {
        let channels = ChatChannels::new();
        let session_id = Uuid::new_v4();
        let mut rx = channels.session_channel(session_id).subscribe();

        let user_id = Uuid::new_v4();
        for _ in 0..(CHANNEL_CAPACITY + 8) {
            channels.publish_session(session_id, &ChatEvent::Typing { user_id });
        }

        // Overflow shows up once as a lag error, then delivery resumes with
        // the retained backlog.
        assert!(matches!(
            rx.recv().await,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_))
        ));
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn sessions_are_isolated_from_each_other() {
        let channels = ChatChannels::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_b = channels.session_channel(b).subscribe();

        channels.publish_session(a, &ChatEvent::Typing { user_id: Uuid::new_v4() });

        assert!(matches!(
            rx_b.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }
}
