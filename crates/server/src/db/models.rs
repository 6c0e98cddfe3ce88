use chrono::{SecondsFormat, Utc};
use pinboard_types::{Comment, CommentKind};

use crate::error::AppError;

/// Column list matching [`CommentRow`]; expects `comments c JOIN users u`.
pub const COMMENT_COLUMNS: &str = "c.id, c.file_id, c.user_id, u.username, c.text_content, \
     c.x_coord, c.y_coord, c.type AS kind, c.parent_id, c.created_at, c.date_last_updated";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub file_id: String,
    pub user_id: i64,
    pub username: String,
    pub text_content: String,
    pub x_coord: f64,
    pub y_coord: f64,
    pub kind: String,
    pub parent_id: Option<i64>,
    pub created_at: String,
    pub date_last_updated: String,
}

impl TryFrom<CommentRow> for Comment {
    type Error = AppError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        let kind = CommentKind::parse(&row.kind).ok_or_else(|| {
            AppError::Internal(format!("comment {} has unknown type {:?}", row.id, row.kind))
        })?;

        Ok(Comment {
            id: row.id,
            file_id: row.file_id,
            user_id: row.user_id,
            username: row.username,
            text_content: row.text_content,
            x_coord: row.x_coord,
            y_coord: row.y_coord,
            kind,
            parent_id: row.parent_id,
            created_at: row.created_at,
            date_last_updated: row.date_last_updated,
        })
    }
}

/// Fixed-width UTC timestamps so that textual ordering in SQL is chronological.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
