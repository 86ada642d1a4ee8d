pub mod auth_dto;
pub mod content_dto;
pub mod quiz_dto;
pub mod room_dto;
pub mod students_dto;
