pub mod auth;
pub mod comments;
