pub mod attempt;
pub mod chat;
pub mod group;
pub mod lesson;
pub mod module;
pub mod question;
pub mod quiz;
pub mod room;
pub mod subject;
pub mod user;
