pub mod channels;
pub mod handler;
