use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use pinboard_types::{
    Comment, CommentId, CommentKind, CommentPage, CommentWithReplies, CreateCommentRequest,
    DeleteResponse, Page, Pagination, UpdateCommentRequest, DEFAULT_FILE_ID,
};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    db::models::{timestamp, CommentRow, COMMENT_COLUMNS},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    AppState,
};

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route(
            "/:id",
            get(get_comment)
                .patch(update_comment)
                .put(update_comment)
                .delete(delete_comment),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
}

async fn fetch_comment(pool: &SqlitePool, id: CommentId) -> Result<Option<Comment>> {
    let row = sqlx::query_as::<_, CommentRow>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON c.user_id = u.id WHERE c.id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Comment::try_from).transpose()
}

async fn fetch_replies(pool: &SqlitePool, parent_ids: &[CommentId]) -> Result<Vec<Comment>> {
    if parent_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON c.user_id = u.id WHERE c.parent_id IN ("
    ));
    let mut ids = query.separated(", ");
    for id in parent_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY c.created_at ASC, c.id ASC");

    query
        .build_query_as::<CommentRow>()
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Comment::try_from)
        .collect()
}

/// Buckets replies by parent, keeping the order they arrived in.
fn group_replies(replies: Vec<Comment>) -> HashMap<CommentId, Vec<Comment>> {
    let mut grouped: HashMap<CommentId, Vec<Comment>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_id {
            grouped.entry(parent_id).or_default().push(reply);
        }
    }
    grouped
}

// Loads the row's owner, failing when the row is missing or owned by someone else
async fn check_ownership(
    pool: &SqlitePool,
    id: CommentId,
    user: &AuthUser,
    action: &str,
) -> Result<CommentKind> {
    let (owner_id, kind) =
        sqlx::query_as::<_, (i64, String)>("SELECT user_id, type FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if owner_id != user.id {
        tracing::info!(comment_id = id, user_id = user.id, "{action} rejected: not the owner");
        return Err(AppError::Forbidden(format!(
            "You can only {action} your own comments"
        )));
    }

    CommentKind::parse(&kind)
        .ok_or_else(|| AppError::Internal(format!("comment {id} has unknown type {kind:?}")))
}

/// Replies may only hang off an existing top-level comment.
async fn check_parent(conn: &mut SqliteConnection, parent_id: CommentId) -> Result<()> {
    let parent_kind = sqlx::query_scalar::<_, String>("SELECT type FROM comments WHERE id = ?")
        .bind(parent_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

    if CommentKind::parse(&parent_kind) != Some(CommentKind::Comment) {
        return Err(AppError::Validation(
            "Replies can only be attached to top-level comments".to_string(),
        ));
    }
    Ok(())
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "Comment text is required".to_string(),
        ));
    }
    Ok(())
}

async fn list_comments(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, AppError>,
) -> Result<Json<CommentPage>> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::Validation(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let offset = i64::from(page - 1) * i64::from(page_size);

    let comments = sqlx::query_as::<_, CommentRow>(&format!(
        r#"
        SELECT {COMMENT_COLUMNS}
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.file_id = ? AND c.type = 'comment'
        ORDER BY c.created_at DESC, c.id DESC
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(DEFAULT_FILE_ID)
    .bind(i64::from(page_size))
    .bind(offset)
    .fetch_all(&state.db.pool)
    .await?
    .into_iter()
    .map(Comment::try_from)
    .collect::<Result<Vec<_>>>()?;

    let ids: Vec<CommentId> = comments.iter().map(|c| c.id).collect();
    let mut replies = group_replies(fetch_replies(&state.db.pool, &ids).await?);

    let data = comments
        .into_iter()
        .map(|comment| CommentWithReplies {
            replies: replies.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect();

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM comments WHERE file_id = ? AND type = 'comment'",
    )
    .bind(DEFAULT_FILE_ID)
    .fetch_one(&state.db.pool)
    .await?;

    Ok(Json(Page {
        data,
        pagination: Pagination::new(page, page_size, total.max(0) as u64),
    }))
}

async fn get_comment(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<CommentId>, AppError>,
) -> Result<Json<CommentWithReplies>> {
    let comment = fetch_comment(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    let replies = match comment.kind {
        CommentKind::Comment => fetch_replies(&state.db.pool, &[comment.id]).await?,
        CommentKind::Reply => Vec::new(),
    };

    Ok(Json(CommentWithReplies { comment, replies }))
}

async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(body), _): WithRejection<Json<CreateCommentRequest>, AppError>,
) -> Result<(StatusCode, Json<Comment>)> {
    validate_text(&body.text_content)?;

    if !body.x_coord.is_finite() || !body.y_coord.is_finite() {
        return Err(AppError::Validation(
            "Coordinates must be finite numbers".to_string(),
        ));
    }

    let kind = body.kind.unwrap_or_default();
    match (kind, body.parent_id) {
        (CommentKind::Comment, Some(_)) => {
            return Err(AppError::Validation(
                "A top-level comment cannot have a parent".to_string(),
            ));
        }
        (CommentKind::Reply, None) => {
            return Err(AppError::Validation(
                "A reply requires parent_id".to_string(),
            ));
        }
        _ => {}
    }

    let now = timestamp();

    // The parent must still exist when the reply lands
    let mut tx = state.db.pool.begin().await?;

    if let Some(parent_id) = body.parent_id {
        check_parent(&mut *tx, parent_id).await?;
    }

    let comment_id = sqlx::query(
        "INSERT INTO comments (file_id, user_id, text_content, x_coord, y_coord, type, parent_id, created_at, date_last_updated) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(DEFAULT_FILE_ID)
    .bind(user.id)
    .bind(&body.text_content)
    .bind(body.x_coord)
    .bind(body.y_coord)
    .bind(kind.as_str())
    .bind(body.parent_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    tracing::info!(comment_id, user_id = user.id, kind = kind.as_str(), "comment created");

    // Re-select to pick up the author's username
    let comment = fetch_comment(&state.db.pool, comment_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("comment {comment_id} vanished after insert")))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<CommentId>, AppError>,
    WithRejection(Json(body), _): WithRejection<Json<UpdateCommentRequest>, AppError>,
) -> Result<Json<Comment>> {
    validate_text(&body.text_content)?;
    check_ownership(&state.db.pool, id, &user, "edit").await?;

    sqlx::query("UPDATE comments SET text_content = ?, date_last_updated = ? WHERE id = ?")
        .bind(&body.text_content)
        .bind(timestamp())
        .bind(id)
        .execute(&state.db.pool)
        .await?;

    tracing::info!(comment_id = id, user_id = user.id, "comment updated");

    let comment = fetch_comment(&state.db.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): WithRejection<Path<CommentId>, AppError>,
) -> Result<Json<DeleteResponse>> {
    let kind = check_ownership(&state.db.pool, id, &user, "delete").await?;

    let mut tx = state.db.pool.begin().await?;

    // Replies go first so the parent reference never dangles
    let removed_replies = if kind == CommentKind::Comment {
        sqlx::query("DELETE FROM comments WHERE parent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
    } else {
        0
    };

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(comment_id = id, user_id = user.id, removed_replies, "comment deleted");

    Ok(Json(DeleteResponse { success: true }))
}
