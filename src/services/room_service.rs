use crate::error::{is_unique_violation, Error, Result};
use crate::models::room::{Room, RoomMember};
use crate::utils::codes::generate_join_code;
use sqlx::PgPool;
use uuid::Uuid;

const JOIN_CODE_LENGTH: usize = 6;
const JOIN_CODE_RETRIES: usize = 5;

#[derive(Clone)]
pub struct RoomService {
    pool: PgPool,
}

impl RoomService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_room(&self, owner_id: Uuid, title: &str) -> Result<Room> {
        // The code column is unique; regenerate on the rare collision.
        for _ in 0..JOIN_CODE_RETRIES {
            let code = generate_join_code(JOIN_CODE_LENGTH);
            let inserted = sqlx::query_as::<_, Room>(
                r#"
                INSERT INTO rooms (owner_id, title, join_code)
                VALUES ($1, $2, $3)
                RETURNING *
                "#,
            )
            .bind(owner_id)
            .bind(title)
            .bind(&code)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(room) => return Ok(room),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::Internal(
            "Could not allocate a unique join code".to_string(),
        ))
    }

    pub async fn list_owned(&self, owner_id: Uuid) -> Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(
            r#"SELECT * FROM rooms WHERE owner_id = $1 ORDER BY created_at DESC"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    pub async fn get_room(&self, room_id: Uuid) -> Result<Room> {
        sqlx::query_as::<_, Room>(r#"SELECT * FROM rooms WHERE id = $1"#)
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Room not found".to_string()))
    }

    /// Room details, join code included, are for participants only: the
    /// owner or a joined member.
    pub async fn room_for_viewer(&self, room_id: Uuid, viewer_id: Uuid) -> Result<Room> {
        let room = self.get_room(room_id).await?;
        if room.owner_id != viewer_id && !self.is_member(room_id, viewer_id).await? {
            return Err(Error::Forbidden("Not a member of this room".to_string()));
        }
        Ok(room)
    }

    pub async fn get_room_by_code(&self, code: &str) -> Result<Room> {
        sqlx::query_as::<_, Room>(r#"SELECT * FROM rooms WHERE join_code = $1"#)
            .bind(code.trim().to_ascii_uppercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("No room with that code".to_string()))
    }

    pub async fn delete_room(&self, room_id: Uuid, owner_id: Uuid) -> Result<()> {
        let room = self.get_room(room_id).await?;
        if room.owner_id != owner_id {
            return Err(Error::Forbidden(
                "Only the room owner may delete it".to_string(),
            ));
        }
        sqlx::query(r#"DELETE FROM rooms WHERE id = $1"#)
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Idempotent: joining twice leaves a single membership row.
    pub async fn join_by_code(&self, code: &str, user_id: Uuid) -> Result<Room> {
        let room = self.get_room_by_code(code).await?;
        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room.id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(room)
    }

    pub async fn add_member(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_members(&self, room_id: Uuid) -> Result<Vec<RoomMember>> {
        self.get_room(room_id).await?;
        let members = sqlx::query_as::<_, RoomMember>(
            r#"SELECT * FROM room_members WHERE room_id = $1 ORDER BY joined_at ASC"#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    pub async fn is_member(&self, room_id: Uuid, user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2)"#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
