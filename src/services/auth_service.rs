use crate::config::get_config;
use crate::dto::auth_dto::{
    RegisterRequest, RoomLoginRequest, RoomLoginResponse, TokenPairResponse,
};
use crate::error::{is_unique_violation, Error, Result};
use crate::middleware::auth::{issue_token, Claims, TOKEN_KIND_ACCESS, TOKEN_KIND_REFRESH};
use crate::models::room::Room;
use crate::models::user::{User, ROLE_GUEST, ROLE_STUDENT, ROLE_TEACHER};
use crate::utils::crypto::{hash_password, verify_password};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User> {
        if req.role != ROLE_TEACHER && req.role != ROLE_STUDENT {
            return Err(Error::BadRequest(format!("Unknown role: {}", req.role)));
        }
        let password_hash = hash_password(&req.password)
            .map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(req.email.to_lowercase())
        .bind(&password_hash)
        .bind(&req.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict("Email is already registered".to_string())
            } else {
                e.into()
            }
        })?;
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPairResponse)> {
        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE email = $1"#)
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid credentials".to_string()))?;

        let ok = verify_password(password, &user.password_hash)
            .map_err(|e| Error::Internal(format!("password verification failed: {}", e)))?;
        if !ok {
            return Err(Error::Unauthorized("Invalid credentials".to_string()));
        }

        let tokens = self.issue_pair(&user)?;
        Ok((user, tokens))
    }

    /// Silent re-issue path: a valid refresh token yields a fresh pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPairResponse> {
        let claims = crate::middleware::auth::decode_token(refresh_token)
            .map_err(|_| Error::Unauthorized("Invalid refresh token".to_string()))?;
        if claims.kind != TOKEN_KIND_REFRESH {
            return Err(Error::Unauthorized(
                "Not a refresh token".to_string(),
            ));
        }

        let user = sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = $1"#)
            .bind(claims.sub)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Unauthorized("Unknown user".to_string()))?;

        self.issue_pair(&user)
    }

    /// Room-code login: creates a guest identity, registers it as a room
    /// member and issues an access token scoped to that room.
    pub async fn room_login(&self, req: RoomLoginRequest) -> Result<RoomLoginResponse> {
        let room = sqlx::query_as::<_, Room>(r#"SELECT * FROM rooms WHERE join_code = $1"#)
            .bind(req.code.trim().to_ascii_uppercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("No room with that code".to_string()))?;

        let guest_id = Uuid::new_v4();
        // Guests cannot log in with credentials; the hash is of random bytes.
        let password_hash = hash_password(&Uuid::new_v4().to_string())
            .map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))?;

        let guest = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(guest_id)
        .bind(&req.name)
        .bind(format!("guest-{}@rooms.local", guest_id))
        .bind(&password_hash)
        .bind(ROLE_GUEST)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room.id)
        .bind(guest.id)
        .execute(&self.pool)
        .await?;

        let config = get_config();
        let claims = Claims {
            sub: guest.id,
            role: ROLE_GUEST.to_string(),
            room_id: Some(room.id),
            kind: TOKEN_KIND_ACCESS.to_string(),
            exp: (Utc::now() + Duration::hours(config.refresh_token_ttl_hours)).timestamp() as usize,
        };

        Ok(RoomLoginResponse {
            access_token: issue_token(&claims)?,
            room_id: room.id,
        })
    }

    fn issue_pair(&self, user: &User) -> Result<TokenPairResponse> {
        let config = get_config();
        let access = Claims {
            sub: user.id,
            role: user.role.clone(),
            room_id: None,
            kind: TOKEN_KIND_ACCESS.to_string(),
            exp: (Utc::now() + Duration::minutes(config.access_token_ttl_minutes)).timestamp()
                as usize,
        };
        let refresh = Claims {
            sub: user.id,
            role: user.role.clone(),
            room_id: None,
            kind: TOKEN_KIND_REFRESH.to_string(),
            exp: (Utc::now() + Duration::hours(config.refresh_token_ttl_hours)).timestamp() as usize,
        };
        Ok(TokenPairResponse {
            access_token: issue_token(&access)?,
            refresh_token: issue_token(&refresh)?,
        })
    }
}
