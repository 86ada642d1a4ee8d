use std::env;

use academy_backend::dto::auth_dto::{RegisterRequest, RoomLoginRequest};
use academy_backend::error::Error;
use academy_backend::models::user::User;
use academy_backend::services::auth_service::AuthService;
use academy_backend::services::chat_service::ChatService;
use academy_backend::services::room_service::RoomService;
use academy_backend::ws::channels::ChatChannels;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

fn init_env() {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    if env::var("JWT_SECRET").is_err() {
        env::set_var("JWT_SECRET", "test_secret_key");
    }
    env::set_var("ACCESS_TOKEN_TTL_MINUTES", "15");
    env::set_var("REFRESH_TOKEN_TTL_HOURS", "24");
    env::set_var("MAX_UPLOAD_BYTES", "1048576");
    let _ = academy_backend::config::init_config();
}

async fn setup() -> sqlx::PgPool {
    init_env();
    assert!(
        env::var("DATABASE_URL").is_ok(),
        "these tests need a live Postgres; set DATABASE_URL"
    );
    let pool = academy_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

async fn register_user(pool: &sqlx::PgPool, role: &str) -> (User, String) {
    let auth = AuthService::new(pool.clone());
    let email = format!("{}_{}@example.com", role, Uuid::new_v4());
    let user = auth
        .register(RegisterRequest {
            name: format!("{} user", role),
            email: email.clone(),
            password: "hunter2hunter2".into(),
            role: role.to_string(),
        })
        .await
        .expect("register");
    let (_, tokens) = auth.login(&email, "hunter2hunter2").await.expect("login");
    (user, tokens.access_token)
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn join_by_code_is_idempotent() {
    let pool = setup().await;
    let rooms = RoomService::new(pool.clone());
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (student, student_token) = register_user(&pool, "student").await;

    let room = rooms.create_room(teacher.id, "Office hours").await.unwrap();
    assert_eq!(room.join_code.len(), 6);
    assert_eq!(room.join_code, room.join_code.to_ascii_uppercase());

    let state = academy_backend::AppState::new(pool.clone());
    let app = Router::new()
        .route(
            "/api/rooms/join",
            post(academy_backend::routes::rooms::join_room),
        )
        .layer(axum::middleware::from_fn(
            academy_backend::middleware::auth::require_user,
        ))
        .with_state(state);

    for _ in 0..2 {
        // Lowercase with padding still resolves; membership stays unique.
        let req = Request::builder()
            .method("POST")
            .uri("/api/rooms/join")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", student_token))
            .body(Body::from(
                json!({ "code": format!("  {}  ", room.join_code.to_lowercase()) }).to_string(),
            ))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let members = rooms.list_members(room.id).await.unwrap();
    assert_eq!(
        members.iter().filter(|m| m.user_id == student.id).count(),
        1
    );
    assert!(rooms.is_member(room.id, student.id).await.unwrap());
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn room_reads_are_for_participants_only() {
    let pool = setup().await;
    let rooms = RoomService::new(pool.clone());
    let auth = AuthService::new(pool.clone());
    let (teacher, teacher_token) = register_user(&pool, "teacher").await;
    let (_, outsider_token) = register_user(&pool, "student").await;

    let room = rooms.create_room(teacher.id, "Staff room").await.unwrap();
    let other = rooms.create_room(teacher.id, "Other room").await.unwrap();
    let guest = auth
        .room_login(RoomLoginRequest {
            code: other.join_code.clone(),
            name: "Guest".into(),
        })
        .await
        .unwrap();

    let state = academy_backend::AppState::new(pool.clone());
    let app = Router::new()
        .route(
            "/api/rooms/:id",
            get(academy_backend::routes::rooms::get_room),
        )
        .route(
            "/api/rooms/:id/members",
            get(academy_backend::routes::rooms::list_members),
        )
        .layer(axum::middleware::from_fn(
            academy_backend::middleware::auth::require_auth,
        ))
        .with_state(state);

    let fetch = |token: String, path: String| {
        let app = app.clone();
        async move {
            let req = Request::builder()
                .uri(path)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap();
            app.oneshot(req).await.unwrap().status()
        }
    };

    // The owner sees the room and its members.
    let path = format!("/api/rooms/{}", room.id);
    let members_path = format!("/api/rooms/{}/members", room.id);
    assert_eq!(fetch(teacher_token.clone(), path.clone()).await, StatusCode::OK);
    assert_eq!(
        fetch(teacher_token.clone(), members_path.clone()).await,
        StatusCode::OK
    );

    // A student who never joined sees neither.
    assert_eq!(
        fetch(outsider_token.clone(), path.clone()).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        fetch(outsider_token, members_path.clone()).await,
        StatusCode::FORBIDDEN
    );

    // A guest stays inside the room its token was issued for.
    assert_eq!(
        fetch(guest.access_token.clone(), path).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        fetch(
            guest.access_token,
            format!("/api/rooms/{}", other.id)
        )
        .await,
        StatusCode::OK
    );
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn guest_room_login_creates_membership_and_scoped_token() {
    let pool = setup().await;
    let rooms = RoomService::new(pool.clone());
    let auth = AuthService::new(pool.clone());
    let (teacher, _) = register_user(&pool, "teacher").await;
    let room = rooms.create_room(teacher.id, "Open day").await.unwrap();

    let login = auth
        .room_login(RoomLoginRequest {
            code: room.join_code.clone(),
            name: "Visiting Guest".into(),
        })
        .await
        .unwrap();
    assert_eq!(login.room_id, room.id);

    let claims =
        academy_backend::middleware::auth::decode_token(&login.access_token).unwrap();
    assert_eq!(claims.role, academy_backend::models::user::ROLE_GUEST);
    assert_eq!(claims.room_id, Some(room.id));
    assert!(rooms.is_member(room.id, claims.sub).await.unwrap());

    let bad = auth
        .room_login(RoomLoginRequest {
            code: "NOSUCH".into(),
            name: "Lost Guest".into(),
        })
        .await;
    assert!(matches!(bad, Err(Error::NotFound(_))));
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn session_is_lazy_and_unique_per_student() {
    let pool = setup().await;
    let channels = ChatChannels::new();
    let rooms = RoomService::new(pool.clone());
    let chat = ChatService::new(pool.clone(), channels);
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (student, _) = register_user(&pool, "student").await;

    let room = rooms.create_room(teacher.id, "Homework help").await.unwrap();

    // Not yet a member.
    let denied = chat.get_or_create_session(room.id, student.id).await;
    assert!(matches!(denied, Err(Error::Forbidden(_))));

    rooms.join_by_code(&room.join_code, student.id).await.unwrap();
    let first = chat.get_or_create_session(room.id, student.id).await.unwrap();
    let second = chat.get_or_create_session(room.id, student.id).await.unwrap();
    assert_eq!(first.id, second.id);

    // The owner talks through student sessions, never one of their own.
    let owner = chat.get_or_create_session(room.id, teacher.id).await;
    assert!(matches!(owner, Err(Error::BadRequest(_))));
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn message_lifecycle_publishes_events() {
    let pool = setup().await;
    let channels = ChatChannels::new();
    let rooms = RoomService::new(pool.clone());
    let chat = ChatService::new(pool.clone(), channels.clone());
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (student, _) = register_user(&pool, "student").await;

    let room = rooms.create_room(teacher.id, "Questions").await.unwrap();
    rooms.join_by_code(&room.join_code, student.id).await.unwrap();
    let session = chat.get_or_create_session(room.id, student.id).await.unwrap();

    let mut rx = channels.session_channel(session.id).subscribe();

    let sent = chat
        .create_session_message(session.id, student.id, "hello?".into(), Vec::new())
        .await
        .unwrap();
    assert_eq!(sent.message.text, "hello?");
    assert!(sent.attachments.is_empty());

    let payload: serde_json::Value =
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(payload["event"], "message_created");
    assert_eq!(payload["data"]["id"], sent.message.id.to_string());

    // Only the sender may edit.
    let denied = chat
        .edit_message(
            sent.message.id,
            teacher.id,
            Some("edited".into()),
            Vec::new(),
            Vec::new(),
        )
        .await;
    assert!(matches!(denied, Err(Error::Forbidden(_))));

    let edited = chat
        .edit_message(
            sent.message.id,
            student.id,
            Some("hello again".into()),
            Vec::new(),
            Vec::new(),
        )
        .await
        .unwrap();
    assert_eq!(edited.message.text, "hello again");
    assert!(edited.message.edited_at.is_some());
    let payload: serde_json::Value =
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(payload["event"], "message_edited");

    // The room owner may delete any message in the room.
    chat.delete_message(sent.message.id, teacher.id).await.unwrap();
    let payload: serde_json::Value =
        serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(payload["event"], "message_deleted");
    assert_eq!(
        payload["data"]["message_id"],
        sent.message.id.to_string()
    );

    let messages = chat.list_messages(session.id, student.id).await.unwrap();
    assert!(messages.iter().all(|m| m.message.id != sent.message.id));
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn room_messages_require_participation() {
    let pool = setup().await;
    let channels = ChatChannels::new();
    let rooms = RoomService::new(pool.clone());
    let chat = ChatService::new(pool.clone(), channels);
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (outsider, _) = register_user(&pool, "student").await;

    let room = rooms.create_room(teacher.id, "Announcements").await.unwrap();
    chat.create_room_message(room.id, teacher.id, "Welcome".into(), Vec::new())
        .await
        .unwrap();

    let denied = chat.list_room_messages(room.id, outsider.id).await;
    assert!(matches!(denied, Err(Error::Forbidden(_))));

    rooms.join_by_code(&room.join_code, outsider.id).await.unwrap();
    let messages = chat.list_room_messages(room.id, outsider.id).await.unwrap();
    assert_eq!(messages.len(), 1);
}
