pub mod chat;
pub mod roles;
