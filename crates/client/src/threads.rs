use std::collections::HashMap;

use pinboard_types::{Comment, CommentId, CommentKind, CommentPage, UserId};

use crate::viewport::Point;

/// Top-level comments plus their replies bucketed by parent, both in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Threads {
    top_level: Vec<Comment>,
    replies: HashMap<CommentId, Vec<Comment>>,
}

impl Threads {
    /// Accepts replies nested under their parent as well as replies listed flat.
    pub fn from_page(page: &CommentPage) -> Self {
        Self::from_comments(page.data.iter().flat_map(|entry| {
            std::iter::once(&entry.comment).chain(entry.replies.iter())
        }))
    }

    pub fn from_comments<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> Self {
        let mut threads = Self::default();
        for comment in comments {
            match (comment.kind, comment.parent_id) {
                (CommentKind::Comment, _) => threads.top_level.push(comment.clone()),
                (CommentKind::Reply, Some(parent)) => threads
                    .replies
                    .entry(parent)
                    .or_default()
                    .push(comment.clone()),
                (CommentKind::Reply, None) => {
                    tracing::warn!(comment_id = comment.id, "dropping reply without a parent");
                }
            }
        }
        threads
    }

    pub fn top_level(&self) -> &[Comment] {
        &self.top_level
    }

    pub fn replies_for(&self, parent: CommentId) -> &[Comment] {
        self.replies.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Center of the bounding box over top-level comments; replies are ignored.
    pub fn bounding_center(&self) -> Option<Point> {
        let first = self.top_level.first()?;
        let init = (first.x_coord, first.x_coord, first.y_coord, first.y_coord);

        let (min_x, max_x, min_y, max_y) =
            self.top_level
                .iter()
                .fold(init, |(min_x, max_x, min_y, max_y), c| {
                    (
                        min_x.min(c.x_coord),
                        max_x.max(c.x_coord),
                        min_y.min(c.y_coord),
                        max_y.max(c.y_coord),
                    )
                });

        Some(Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0))
    }
}

/// Whether `viewer` may see edit/delete affordances for `comment`.
/// The server re-checks ownership on every mutation.
pub fn can_modify(viewer: Option<UserId>, comment: &Comment) -> bool {
    viewer == Some(comment.user_id)
}
