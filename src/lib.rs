pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;
pub mod ws;

use crate::services::{
    attempt_service::AttemptService, auth_service::AuthService, chat_service::ChatService,
    content_service::ContentService, quiz_service::QuizService, room_service::RoomService,
    students_service::StudentsService,
};
use crate::ws::channels::ChatChannels;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub channels: ChatChannels,
    pub auth_service: AuthService,
    pub content_service: ContentService,
    pub quiz_service: QuizService,
    pub attempt_service: AttemptService,
    pub room_service: RoomService,
    pub chat_service: ChatService,
    pub students_service: StudentsService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let channels = ChatChannels::new();

        let auth_service = AuthService::new(pool.clone());
        let content_service = ContentService::new(pool.clone());
        let quiz_service = QuizService::new(pool.clone());
        let attempt_service = AttemptService::new(pool.clone());
        let room_service = RoomService::new(pool.clone());
        let chat_service = ChatService::new(pool.clone(), channels.clone());
        let students_service = StudentsService::new(pool.clone());

        Self {
            pool,
            channels,
            auth_service,
            content_service,
            quiz_service,
            attempt_service,
            room_service,
            chat_service,
            students_service,
        }
    }
}
