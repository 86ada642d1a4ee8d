use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub const TOKEN_KIND_ACCESS: &str = "access";
pub const TOKEN_KIND_REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    /// Present only on guest tokens issued through the room-code login.
    pub room_id: Option<Uuid>,
    pub kind: String,
    pub exp: usize,
}

impl Claims {
    /// Guest tokens carry the one room they were issued for; any other room
    /// is off limits. Tokens without a scope pass.
    pub fn ensure_room_scope(&self, room_id: Uuid) -> crate::error::Result<()> {
        if let Some(scoped) = self.room_id {
            if scoped != room_id {
                return Err(crate::error::Error::Forbidden(
                    "Token is scoped to a different room".to_string(),
                ));
            }
        }
        Ok(())
    }
}

pub fn issue_token(claims: &Claims) -> crate::error::Result<String> {
    let config = crate::config::get_config();
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| crate::error::Error::Internal(format!("token encoding failed: {}", e)))
}

pub fn decode_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let config = crate::config::get_config();
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}

fn bearer_claims(req: &Request) -> Result<Claims, Response> {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return Err(unauthorized("missing_authorization"));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(unauthorized("bad_authorization"));
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(unauthorized("unsupported_scheme"));
    };
    let Ok(claims) = decode_token(token) else {
        return Err(unauthorized("invalid_token"));
    };
    if claims.kind != TOKEN_KIND_ACCESS {
        return Err(unauthorized("invalid_token"));
    }
    Ok(claims)
}

/// Any authenticated identity, guests included. Validated claims land in
/// request extensions.
pub async fn require_auth(mut req: Request, next: Next) -> Response {
    match bearer_claims(&req) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

pub async fn require_teacher(mut req: Request, next: Next) -> Response {
    match bearer_claims(&req) {
        Ok(claims) => {
            if !claims.role.eq_ignore_ascii_case(crate::models::user::ROLE_TEACHER) {
                return (StatusCode::FORBIDDEN, Json(json!({"error":"forbidden"}))).into_response();
            }
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

/// Registered users only, i.e. guests stay out.
pub async fn require_user(mut req: Request, next: Next) -> Response {
    match bearer_claims(&req) {
        Ok(claims) => {
            if claims.role.eq_ignore_ascii_case(crate::models::user::ROLE_GUEST) {
                return (StatusCode::FORBIDDEN, Json(json!({"error":"forbidden"}))).into_response();
            }
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}
