pub mod attempt_service;
pub mod auth_service;
pub mod chat_service;
pub mod content_service;
pub mod grading;
pub mod quiz_service;
pub mod room_service;
pub mod students_service;
pub mod upload_service;
