pub mod auth;
pub mod chats;
pub mod health;
pub mod lessons;
pub mod modules;
pub mod quizzes;
pub mod rooms;
pub mod students;
pub mod subjects;
