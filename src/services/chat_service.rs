use crate::error::{Error, Result};
use crate::models::chat::{ChatMessage, ChatSession, MessageAttachment, MessageWithAttachments};
use crate::models::room::Room;
use crate::services::upload_service::{StoredFile, UploadService};
use crate::ws::channels::{ChatChannels, ChatEvent};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// All chat mutations go through this service; the WebSocket layer only
/// subscribes and relays, so the HTTP path is the single source of truth.
#[derive(Clone)]
pub struct ChatService {
    pool: PgPool,
    channels: ChatChannels,
}

impl ChatService {
    pub fn new(pool: PgPool, channels: ChatChannels) -> Self {
        Self { pool, channels }
    }

    /// Lazily creates the (room, student) session on first request.
    pub async fn get_or_create_session(&self, room_id: Uuid, student_id: Uuid) -> Result<ChatSession> {
        let room = self.fetch_room(room_id).await?;
        if room.owner_id == student_id {
            return Err(Error::BadRequest(
                "Room owners do not have their own chat session".to_string(),
            ));
        }
        let is_member: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2)"#,
        )
        .bind(room_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        if !is_member {
            return Err(Error::Forbidden(
                "Join the room before opening a chat".to_string(),
            ));
        }

        // Upsert so a second request returns the existing session.
        let session = sqlx::query_as::<_, ChatSession>(
            r#"
            INSERT INTO chat_sessions (room_id, student_id)
            VALUES ($1, $2)
            ON CONFLICT (room_id, student_id) DO UPDATE SET room_id = EXCLUDED.room_id
            RETURNING *
            "#,
        )
        .bind(room_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn list_sessions(&self, room_id: Uuid, teacher_id: Uuid) -> Result<Vec<ChatSession>> {
        let room = self.fetch_room(room_id).await?;
        if room.owner_id != teacher_id {
            return Err(Error::Forbidden(
                "Only the room owner may list its sessions".to_string(),
            ));
        }
        let sessions = sqlx::query_as::<_, ChatSession>(
            r#"SELECT * FROM chat_sessions WHERE room_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    pub async fn list_messages(
        &self,
        session_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Vec<MessageWithAttachments>> {
        let session = self.fetch_session(session_id).await?;
        self.ensure_participant(&session, viewer_id).await?;

        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"SELECT * FROM chat_messages WHERE session_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let attachments = sqlx::query_as::<_, MessageAttachment>(
            r#"
            SELECT a.* FROM message_attachments a
            JOIN chat_messages m ON m.id = a.message_id
            WHERE m.session_id = $1
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_message: HashMap<Uuid, Vec<MessageAttachment>> = HashMap::new();
        for attachment in attachments {
            by_message
                .entry(attachment.message_id)
                .or_default()
                .push(attachment);
        }

        Ok(messages
            .into_iter()
            .map(|message| {
                let attachments = by_message.remove(&message.id).unwrap_or_default();
                MessageWithAttachments {
                    message,
                    attachments,
                }
            })
            .collect())
    }

    pub async fn list_room_messages(
        &self,
        room_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Vec<MessageWithAttachments>> {
        let room = self.fetch_room(room_id).await?;
        if room.owner_id != viewer_id {
            let is_member: bool = sqlx::query_scalar(
                r#"SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2)"#,
            )
            .bind(room_id)
            .bind(viewer_id)
            .fetch_one(&self.pool)
            .await?;
            if !is_member {
                return Err(Error::Forbidden("Not a member of this room".to_string()));
            }
        }

        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"SELECT * FROM chat_messages WHERE room_id = $1 AND session_id IS NULL ORDER BY created_at ASC"#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(messages.len());
        for message in messages {
            let attachments = self.attachments_of(message.id).await?;
            result.push(MessageWithAttachments {
                message,
                attachments,
            });
        }
        Ok(result)
    }

    pub async fn create_session_message(
        &self,
        session_id: Uuid,
        sender_id: Uuid,
        text: String,
        files: Vec<StoredFile>,
    ) -> Result<MessageWithAttachments> {
        let session = self.fetch_session(session_id).await?;
        self.ensure_participant(&session, sender_id).await?;

        let created = self
            .insert_message(session.room_id, Some(session_id), sender_id, text, files)
            .await?;
        self.channels
            .publish_session(session_id, &ChatEvent::MessageCreated(created.clone()));
        Ok(created)
    }

    /// Room-level broadcast material, posted by the owner only.
    pub async fn create_room_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        text: String,
        files: Vec<StoredFile>,
    ) -> Result<MessageWithAttachments> {
        let room = self.fetch_room(room_id).await?;
        if room.owner_id != sender_id {
            return Err(Error::Forbidden(
                "Only the room owner may post room-level messages".to_string(),
            ));
        }

        let created = self
            .insert_message(room_id, None, sender_id, text, files)
            .await?;
        self.channels
            .publish_room(room_id, &ChatEvent::MessageCreated(created.clone()));
        Ok(created)
    }

    /// Edit: replace text, drop the named attachments, add the new files.
    pub async fn edit_message(
        &self,
        message_id: Uuid,
        editor_id: Uuid,
        text: Option<String>,
        remove_attachment_ids: Vec<Uuid>,
        new_files: Vec<StoredFile>,
    ) -> Result<MessageWithAttachments> {
        let message = self.fetch_message(message_id).await?;
        if message.sender_id != editor_id {
            return Err(Error::Forbidden(
                "Only the sender may edit a message".to_string(),
            ));
        }

        let tx_result: Result<Vec<String>> = async {
            let mut tx = self.pool.begin().await?;

            sqlx::query(
                r#"
                UPDATE chat_messages
                SET text = COALESCE($1, text), edited_at = NOW()
                WHERE id = $2
                "#,
            )
            .bind(&text)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;

            let removed_paths: Vec<String> = if remove_attachment_ids.is_empty() {
                Vec::new()
            } else {
                sqlx::query_scalar(
                    r#"
                    DELETE FROM message_attachments
                    WHERE message_id = $1 AND id = ANY($2)
                    RETURNING file_path
                    "#,
                )
                .bind(message_id)
                .bind(&remove_attachment_ids)
                .fetch_all(&mut *tx)
                .await?
            };

            for file in &new_files {
                sqlx::query(
                    r#"
                    INSERT INTO message_attachments (message_id, file_name, file_path, content_type, size_bytes)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(message_id)
                .bind(&file.file_name)
                .bind(&file.file_path)
                .bind(&file.content_type)
                .bind(file.size_bytes)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(removed_paths)
        }
        .await;

        let removed_paths = match tx_result {
            Ok(paths) => paths,
            Err(e) => {
                UploadService::discard(&new_files).await;
                return Err(e);
            }
        };

        // Disk cleanup happens after commit so a rollback never loses files.
        for path in &removed_paths {
            UploadService::remove_by_public_path(path).await;
        }

        let message = self.fetch_message(message_id).await?;
        let attachments = self.attachments_of(message_id).await?;
        let edited = MessageWithAttachments {
            message,
            attachments,
        };
        self.publish(&edited.message, ChatEvent::MessageEdited(edited.clone()));
        Ok(edited)
    }

    /// Sender or room owner may delete.
    pub async fn delete_message(&self, message_id: Uuid, actor_id: Uuid) -> Result<()> {
        let message = self.fetch_message(message_id).await?;
        if message.sender_id != actor_id {
            let room = self.fetch_room(message.room_id).await?;
            if room.owner_id != actor_id {
                return Err(Error::Forbidden(
                    "Only the sender or the room owner may delete a message".to_string(),
                ));
            }
        }

        let paths: Vec<String> = sqlx::query_scalar(
            r#"SELECT file_path FROM message_attachments WHERE message_id = $1"#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        sqlx::query(r#"DELETE FROM chat_messages WHERE id = $1"#)
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        for path in &paths {
            UploadService::remove_by_public_path(path).await;
        }

        self.publish(&message, ChatEvent::MessageDeleted { message_id });
        Ok(())
    }

    pub async fn session_for_viewer(&self, session_id: Uuid, viewer_id: Uuid) -> Result<ChatSession> {
        let session = self.fetch_session(session_id).await?;
        self.ensure_participant(&session, viewer_id).await?;
        Ok(session)
    }

    async fn insert_message(
        &self,
        room_id: Uuid,
        session_id: Option<Uuid>,
        sender_id: Uuid,
        text: String,
        files: Vec<StoredFile>,
    ) -> Result<MessageWithAttachments> {
        let tx_result: Result<MessageWithAttachments> = async {
            let mut tx = self.pool.begin().await?;

            let message = sqlx::query_as::<_, ChatMessage>(
                r#"
                INSERT INTO chat_messages (room_id, session_id, sender_id, text)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(room_id)
            .bind(session_id)
            .bind(sender_id)
            .bind(&text)
            .fetch_one(&mut *tx)
            .await?;

            let mut attachments = Vec::with_capacity(files.len());
            for file in &files {
                let attachment = sqlx::query_as::<_, MessageAttachment>(
                    r#"
                    INSERT INTO message_attachments (message_id, file_name, file_path, content_type, size_bytes)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                    "#,
                )
                .bind(message.id)
                .bind(&file.file_name)
                .bind(&file.file_path)
                .bind(&file.content_type)
                .bind(file.size_bytes)
                .fetch_one(&mut *tx)
                .await?;
                attachments.push(attachment);
            }

            tx.commit().await?;
            Ok(MessageWithAttachments {
                message,
                attachments,
            })
        }
        .await;

        match tx_result {
            Ok(created) => Ok(created),
            Err(e) => {
                // The files were written before the transaction; do not leave
                // orphans behind when it fails.
                UploadService::discard(&files).await;
                Err(e)
            }
        }
    }

    fn publish(&self, message: &ChatMessage, event: ChatEvent) {
        match message.session_id {
            Some(session_id) => self.channels.publish_session(session_id, &event),
            None => self.channels.publish_room(message.room_id, &event),
        }
    }

    async fn ensure_participant(&self, session: &ChatSession, user_id: Uuid) -> Result<()> {
        if session.student_id == user_id {
            return Ok(());
        }
        let room = self.fetch_room(session.room_id).await?;
        if room.owner_id == user_id {
            return Ok(());
        }
        Err(Error::Forbidden(
            "Not a participant of this chat session".to_string(),
        ))
    }

    async fn fetch_room(&self, room_id: Uuid) -> Result<Room> {
        sqlx::query_as::<_, Room>(r#"SELECT * FROM rooms WHERE id = $1"#)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Room not found".to_string()))
    }

    async fn fetch_session(&self, session_id: Uuid) -> Result<ChatSession> {
        sqlx::query_as::<_, ChatSession>(r#"SELECT * FROM chat_sessions WHERE id = $1"#)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Chat session not found".to_string()))
    }

    async fn fetch_message(&self, message_id: Uuid) -> Result<ChatMessage> {
        sqlx::query_as::<_, ChatMessage>(r#"SELECT * FROM chat_messages WHERE id = $1"#)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Message not found".to_string()))
    }

    async fn attachments_of(&self, message_id: Uuid) -> Result<Vec<MessageAttachment>> {
        let attachments = sqlx::query_as::<_, MessageAttachment>(
            r#"SELECT * FROM message_attachments WHERE message_id = $1 ORDER BY created_at ASC"#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attachments)
    }
}
