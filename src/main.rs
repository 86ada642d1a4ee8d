use academy_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::auth::{require_auth, require_teacher, require_user},
    routes, ws, AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    tokio::fs::create_dir_all(&config.uploads_dir).await?;
    info!("Serving uploads from: {}", config.uploads_dir);

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let auth_api = Router::new()
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/auth/room-login", post(routes::auth::room_login));

    let teacher_api = Router::new()
        .route("/api/subjects", post(routes::subjects::create_subject))
        .route(
            "/api/subjects/:id",
            patch(routes::subjects::update_subject).delete(routes::subjects::delete_subject),
        )
        .route(
            "/api/subjects/:id/modules",
            post(routes::modules::create_module),
        )
        .route(
            "/api/subjects/:id/modules/reorder",
            post(routes::modules::reorder_modules),
        )
        .route(
            "/api/modules/:id",
            patch(routes::modules::update_module).delete(routes::modules::delete_module),
        )
        .route(
            "/api/modules/:id/lessons",
            post(routes::lessons::create_lesson),
        )
        .route(
            "/api/modules/:id/lessons/reorder",
            post(routes::lessons::reorder_lessons),
        )
        .route(
            "/api/lessons/:id",
            patch(routes::lessons::update_lesson).delete(routes::lessons::delete_lesson),
        )
        .route(
            "/api/lessons/:id/quizzes",
            post(routes::quizzes::create_quiz),
        )
        .route(
            "/api/quizzes/:id",
            patch(routes::quizzes::update_quiz).delete(routes::quizzes::delete_quiz),
        )
        .route(
            "/api/quizzes/:id/publish",
            post(routes::quizzes::publish_quiz),
        )
        .route(
            "/api/quizzes/:id/questions",
            post(routes::quizzes::create_question),
        )
        .route(
            "/api/quizzes/:id/questions/reorder",
            post(routes::quizzes::reorder_questions),
        )
        .route(
            "/api/questions/:id",
            patch(routes::quizzes::update_question).delete(routes::quizzes::delete_question),
        )
        .route(
            "/api/questions/:id/options",
            post(routes::quizzes::create_option),
        )
        .route(
            "/api/questions/:id/options/reorder",
            post(routes::quizzes::reorder_options),
        )
        .route(
            "/api/options/:id",
            patch(routes::quizzes::update_option).delete(routes::quizzes::delete_option),
        )
        .route(
            "/api/quizzes/:id/attempts",
            get(routes::quizzes::list_attempts),
        )
        .route(
            "/api/rooms",
            get(routes::rooms::list_rooms).post(routes::rooms::create_room),
        )
        .route("/api/rooms/:id", delete(routes::rooms::delete_room))
        .route("/api/rooms/:id/sessions", get(routes::chats::list_sessions))
        .route(
            "/api/rooms/:id/messages",
            post(routes::chats::send_room_message),
        )
        .route(
            "/api/subjects/:id/students",
            get(routes::students::list_students).post(routes::students::add_student),
        )
        .route(
            "/api/subjects/:id/students/:student_id",
            delete(routes::students::remove_student),
        )
        .route(
            "/api/subjects/:id/groups",
            get(routes::students::list_groups).post(routes::students::create_group),
        )
        .route(
            "/api/subjects/:id/groups/stats",
            get(routes::students::group_stats),
        )
        .route("/api/subjects/:id/stats", get(routes::students::subject_stats))
        .route(
            "/api/groups/:id",
            patch(routes::students::rename_group).delete(routes::students::delete_group),
        )
        .route(
            "/api/groups/:id/students",
            post(routes::students::assign_students),
        )
        .route(
            "/api/groups/:id/students/:student_id",
            delete(routes::students::remove_from_group),
        )
        .layer(axum::middleware::from_fn(require_teacher));

    let user_api = Router::new()
        .route(
            "/api/quizzes/:id/attempts",
            post(routes::quizzes::submit_attempt),
        )
        .route(
            "/api/quizzes/:id/attempts/mine",
            get(routes::quizzes::list_my_attempts),
        )
        .route("/api/rooms/join", post(routes::rooms::join_room))
        .layer(axum::middleware::from_fn(require_user));

    let authed_api = Router::new()
        .route("/api/subjects", get(routes::subjects::list_subjects))
        .route("/api/subjects/:id", get(routes::subjects::get_subject))
        .route(
            "/api/subjects/:id/modules",
            get(routes::modules::list_modules),
        )
        .route(
            "/api/modules/:id/lessons",
            get(routes::lessons::list_lessons),
        )
        .route("/api/lessons/:id", get(routes::lessons::get_lesson))
        .route(
            "/api/lessons/:id/quizzes",
            get(routes::quizzes::list_quizzes),
        )
        .route("/api/quizzes/:id", get(routes::quizzes::get_quiz))
        .route("/api/attempts/:id", get(routes::quizzes::get_attempt))
        .route("/api/rooms/:id", get(routes::rooms::get_room))
        .route("/api/rooms/:id/members", get(routes::rooms::list_members))
        .route("/api/rooms/:id/session", get(routes::chats::my_session))
        .route(
            "/api/rooms/:id/messages",
            get(routes::chats::list_room_messages),
        )
        .route(
            "/api/sessions/:id/messages",
            get(routes::chats::list_messages).post(routes::chats::send_message),
        )
        .route(
            "/api/messages/:id",
            patch(routes::chats::edit_message).delete(routes::chats::delete_message),
        )
        .layer(axum::middleware::from_fn(require_auth));

    // Live channels authenticate via query token inside the handler.
    let ws_api = Router::new()
        .route("/ws/sessions/:id", get(ws::handler::session_ws))
        .route("/ws/rooms/:id", get(ws::handler::room_ws));

    let app = base_routes
        .merge(auth_api)
        .merge(teacher_api)
        .merge(user_api)
        .merge(authed_api)
        .merge(ws_api)
        .nest_service(
            "/uploads",
            tower_http::services::ServeDir::new(&config.uploads_dir),
        )
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
