use std::env;

use academy_backend::dto::auth_dto::RegisterRequest;
use academy_backend::dto::content_dto::{
    CreateLessonRequest, CreateModuleRequest, CreateSubjectRequest,
};
use academy_backend::dto::quiz_dto::{
    CreateOptionRequest, CreateQuestionRequest, CreateQuizRequest,
};
use academy_backend::models::question::QuestionType;
use academy_backend::models::user::User;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value as JsonValue};
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
    let auth = academy_backend::services::auth_service::AuthService::new(pool.clone());
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

struct QuizFixture {
    quiz_id: Uuid,
    single_question: Uuid,
    single_correct: Uuid,
    single_wrong: Uuid,
    text_question: Uuid,
}

/// Quiz from the worked example: Q1 single-choice (correct option A),
/// Q2 short-text accepting "paris" / "Paris ", threshold 50.
async fn seed_quiz(pool: &sqlx::PgPool, teacher: &User) -> QuizFixture {
    let content = academy_backend::services::content_service::ContentService::new(pool.clone());
    let quiz_svc = academy_backend::services::quiz_service::QuizService::new(pool.clone());

    let subject = content
        .create_subject(
            teacher.id,
            CreateSubjectRequest {
                title: "Geography".into(),
                description: None,
            },
        )
        .await
        .expect("subject");
    let module = content
        .create_module(
            subject.id,
            teacher.id,
            CreateModuleRequest {
                title: "Europe".into(),
            },
        )
        .await
        .expect("module");
    let lesson = content
        .create_lesson(
            module.id,
            teacher.id,
            CreateLessonRequest {
                title: "Capitals".into(),
                content: None,
            },
        )
        .await
        .expect("lesson");

    let quiz = quiz_svc
        .create_quiz(
            lesson.id,
            teacher.id,
            CreateQuizRequest {
                title: "Capitals quiz".into(),
                pass_threshold: 50,
                max_attempts: Some(2),
                shuffle_questions: None,
                shuffle_options: None,
                time_limit_minutes: None,
            },
        )
        .await
        .expect("quiz");

    let q1 = quiz_svc
        .create_question(
            quiz.id,
            teacher.id,
            CreateQuestionRequest {
                question_type: QuestionType::SingleChoice,
                text: "Pick A".into(),
                required: None,
            },
        )
        .await
        .expect("q1");
    let a = quiz_svc
        .create_option(
            q1.id,
            teacher.id,
            CreateOptionRequest {
                text: "A".into(),
                is_correct: Some(true),
            },
        )
        .await
        .expect("option a");
    let b = quiz_svc
        .create_option(
            q1.id,
            teacher.id,
            CreateOptionRequest {
                text: "B".into(),
                is_correct: Some(false),
            },
        )
        .await
        .expect("option b");

    let q2 = quiz_svc
        .create_question(
            quiz.id,
            teacher.id,
            CreateQuestionRequest {
                question_type: QuestionType::ShortText,
                text: "Capital of France?".into(),
                required: None,
            },
        )
        .await
        .expect("q2");
    for accepted in ["paris", "Paris "] {
        quiz_svc
            .create_option(
                q2.id,
                teacher.id,
                CreateOptionRequest {
                    text: accepted.into(),
                    is_correct: Some(false),
                },
            )
            .await
            .expect("accepted answer");
    }

    quiz_svc
        .set_published(quiz.id, teacher.id, true)
        .await
        .expect("publish");

    QuizFixture {
        quiz_id: quiz.id,
        single_question: q1.id,
        single_correct: a.id,
        single_wrong: b.id,
        text_question: q2.id,
    }
}

fn attempt_router(pool: &sqlx::PgPool) -> Router {
    let state = academy_backend::AppState::new(pool.clone());
    Router::new()
        .route(
            "/api/quizzes/:id/attempts",
            post(academy_backend::routes::quizzes::submit_attempt),
        )
        .route(
            "/api/quizzes/:id/attempts/mine",
            get(academy_backend::routes::quizzes::list_my_attempts),
        )
        .layer(axum::middleware::from_fn(
            academy_backend::middleware::auth::require_user,
        ))
        .with_state(state)
}

async fn submit(
    app: &Router,
    quiz_id: Uuid,
    token: &str,
    answers: JsonValue,
) -> (StatusCode, JsonValue) {
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/quizzes/{}/attempts", quiz_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({ "answers": answers }).to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, body)
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn submission_grades_and_records_answers() {
    let pool = setup().await;
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (student, student_token) = register_user(&pool, "student").await;
    let fixture = seed_quiz(&pool, &teacher).await;
    let app = attempt_router(&pool);

    let (status, body) = submit(
        &app,
        fixture.quiz_id,
        &student_token,
        json!({
            fixture.single_question.to_string(): fixture.single_correct.to_string(),
            fixture.text_question.to_string(): " PARIS ",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["percent"], 100);
    assert_eq!(body["passed"], true);
    assert_eq!(body["attempt"]["try_index"], 1);

    // Exactly one answer row per question at submission time.
    let attempt_id = Uuid::parse_str(body["attempt"]["id"].as_str().unwrap()).unwrap();
    let answer_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attempt_answers WHERE attempt_id = $1")
            .bind(attempt_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(answer_count, 2);

    let attempt_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND user_id = $2",
    )
    .bind(fixture.quiz_id)
    .bind(student.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(attempt_count, 1);
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn wrong_answers_fail_and_try_index_increments() {
    let pool = setup().await;
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (_, student_token) = register_user(&pool, "student").await;
    let fixture = seed_quiz(&pool, &teacher).await;
    let app = attempt_router(&pool);

    let wrong = json!({
        fixture.single_question.to_string(): fixture.single_wrong.to_string(),
        fixture.text_question.to_string(): "london",
    });

    let (status, body) = submit(&app, fixture.quiz_id, &student_token, wrong.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["percent"], 0);
    assert_eq!(body["passed"], false);
    assert_eq!(body["attempt"]["try_index"], 1);

    let (status, body) = submit(&app, fixture.quiz_id, &student_token, wrong.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["attempt"]["try_index"], 2);

    // max_attempts is 2 in the fixture.
    let (status, body) = submit(&app, fixture.quiz_id, &student_token, wrong).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("attempts"));
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn attempt_listing_is_limited_to_the_quiz_authority() {
    let pool = setup().await;
    let (teacher, teacher_token) = register_user(&pool, "teacher").await;
    let (_, other_teacher_token) = register_user(&pool, "teacher").await;
    let fixture = seed_quiz(&pool, &teacher).await;

    let state = academy_backend::AppState::new(pool.clone());
    let app = Router::new()
        .route(
            "/api/quizzes/:id/attempts",
            get(academy_backend::routes::quizzes::list_attempts),
        )
        .layer(axum::middleware::from_fn(
            academy_backend::middleware::auth::require_teacher,
        ))
        .with_state(state);

    let fetch = |token: String| {
        let app = app.clone();
        let uri = format!("/api/quizzes/{}/attempts", fixture.quiz_id);
        async move {
            let req = Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap();
            app.oneshot(req).await.unwrap().status()
        }
    };

    assert_eq!(fetch(teacher_token).await, StatusCode::OK);
    assert_eq!(fetch(other_teacher_token).await, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn unknown_quiz_is_not_found_and_empty_quiz_is_rejected() {
    let pool = setup().await;
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (_, student_token) = register_user(&pool, "student").await;
    let app = attempt_router(&pool);

    let (status, _) = submit(&app, Uuid::new_v4(), &student_token, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A published quiz with zero questions cannot be submitted.
    let fixture = seed_quiz(&pool, &teacher).await;
    let quiz_svc = academy_backend::services::quiz_service::QuizService::new(pool.clone());
    quiz_svc
        .delete_question(fixture.single_question, teacher.id)
        .await
        .unwrap();
    quiz_svc
        .delete_question(fixture.text_question, teacher.id)
        .await
        .unwrap();

    let (status, _) = submit(&app, fixture.quiz_id, &student_token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "needs a live Postgres (DATABASE_URL)"]
async fn unpublished_quiz_rejects_submissions() {
    let pool = setup().await;
    let (teacher, _) = register_user(&pool, "teacher").await;
    let (_, student_token) = register_user(&pool, "student").await;
    let fixture = seed_quiz(&pool, &teacher).await;

    let quiz_svc = academy_backend::services::quiz_service::QuizService::new(pool.clone());
    quiz_svc
        .set_published(fixture.quiz_id, teacher.id, false)
        .await
        .unwrap();

    let app = attempt_router(&pool);
    let (status, _) = submit(&app, fixture.quiz_id, &student_token, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
