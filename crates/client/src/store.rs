use chrono::{SecondsFormat, Utc};
use pinboard_types::{Comment, CommentId, CommentPage, CreateCommentRequest, UpdateCommentRequest};

use crate::{
    api::CommentsBackend, cache::QueryCache, error::Result, optimistic::Optimistic,
    threads::Threads,
};

/// Page size the canvas loads by default.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageKey {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Cached comment pages kept in sync with a backend.
pub struct CommentStore<B> {
    backend: B,
    cache: QueryCache<PageKey, CommentPage>,
    current: PageKey,
}

impl<B: CommentsBackend> CommentStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            cache: QueryCache::new(),
            current: PageKey::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn current(&self) -> PageKey {
        self.current
    }

    /// The cached page being displayed, stale or not.
    pub fn page(&self) -> Option<&CommentPage> {
        self.cache.get(&self.current)
    }

    pub fn threads(&self) -> Threads {
        self.page().map(Threads::from_page).unwrap_or_default()
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale(&self.current)
    }

    /// Fetches `key` and makes it the displayed page.
    pub async fn load(&mut self, key: PageKey) -> Result<()> {
        self.current = key;
        let ticket = self.cache.begin_fetch(key);
        let page = self.backend.list_comments(key.page, key.page_size).await?;
        if self.cache.complete_fetch(ticket, page) {
            tracing::debug!(page = key.page, "comment page loaded");
        }
        Ok(())
    }

    pub async fn refresh(&mut self) -> Result<()> {
        self.load(self.current).await
    }

    pub async fn create(&mut self, request: CreateCommentRequest) -> Result<Comment> {
        let created = self.backend.create_comment(&request).await?;
        tracing::debug!(comment_id = created.id, "comment created");
        self.settle().await;
        Ok(created)
    }

    /// Patches the displayed page right away. The returned edit must be
    /// handed to [`finish_update`](Self::finish_update) or
    /// [`abandon_update`](Self::abandon_update) once the request resolves.
    pub fn begin_update(&mut self, id: CommentId, text_content: String) -> PendingEdit {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let patch = Optimistic::apply(&mut self.cache, self.current, |page| {
            edit_in_page(page, id, &text_content, &now);
        });
        // Unconfirmed until the server answers
        self.cache.invalidate(&self.current);
        tracing::debug!(comment_id = id, "applied optimistic edit");

        PendingEdit {
            id,
            request: UpdateCommentRequest { text_content },
            patch,
        }
    }

    /// Keeps the patch on success, restores the previous page on failure,
    /// then refetches either way.
    pub async fn finish_update(
        &mut self,
        pending: PendingEdit,
        result: Result<Comment>,
    ) -> Result<Comment> {
        match &result {
            Ok(_) => pending.patch.commit(),
            Err(err) => {
                tracing::warn!(comment_id = pending.id, error = %err, "edit rejected, reverting");
                pending.patch.revert(&mut self.cache);
            }
        }

        self.settle().await;
        result
    }

    /// Drops an edit whose outcome is unknown; the page reverts and stays stale.
    pub fn abandon_update(&mut self, pending: PendingEdit) {
        tracing::warn!(comment_id = pending.id, "edit abandoned, reverting");
        pending.patch.revert(&mut self.cache);
        self.cache.invalidate_all();
    }

    /// Runs a whole edit. Dropping the future mid-request reverts the patch.
    pub async fn update(&mut self, id: CommentId, text_content: String) -> Result<Comment> {
        let PendingEdit { id, request, patch } = self.begin_update(id, text_content);

        let mut guard = RevertOnDrop {
            cache: &mut self.cache,
            id,
            patch: Some(patch),
        };
        let result = self.backend.update_comment(id, &request).await;
        let patch = guard.patch.take();
        drop(guard);

        match patch {
            Some(patch) => {
                let pending = PendingEdit { id, request, patch };
                self.finish_update(pending, result).await
            }
            None => result,
        }
    }

    pub async fn delete(&mut self, id: CommentId) -> Result<()> {
        self.backend.delete_comment(id).await?;
        tracing::debug!(comment_id = id, "comment deleted");
        self.settle().await;
        Ok(())
    }

    // Mark everything stale and bring the displayed page back in line with the server
    async fn settle(&mut self) {
        self.cache.invalidate_all();
        tracing::debug!("comment cache invalidated");
        if let Err(err) = self.refresh().await {
            tracing::warn!(error = %err, "refetch after mutation failed");
        }
    }
}

/// An optimistic edit awaiting the server's answer.
#[must_use = "a pending edit must be finished or abandoned"]
pub struct PendingEdit {
    id: CommentId,
    request: UpdateCommentRequest,
    patch: Optimistic<PageKey, CommentPage>,
}

impl PendingEdit {
    pub fn id(&self) -> CommentId {
        self.id
    }

    pub fn request(&self) -> &UpdateCommentRequest {
        &self.request
    }
}

struct RevertOnDrop<'a> {
    cache: &'a mut QueryCache<PageKey, CommentPage>,
    id: CommentId,
    patch: Option<Optimistic<PageKey, CommentPage>>,
}

impl Drop for RevertOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(patch) = self.patch.take() {
            tracing::warn!(comment_id = self.id, "edit cancelled in flight, reverting");
            patch.revert(self.cache);
            self.cache.invalidate_all();
        }
    }
}

fn edit_in_page(page: &mut CommentPage, id: CommentId, text: &str, updated_at: &str) {
    let target = page
        .data
        .iter_mut()
        .flat_map(|entry| std::iter::once(&mut entry.comment).chain(entry.replies.iter_mut()))
        .find(|c| c.id == id);

    if let Some(comment) = target {
        comment.text_content = text.to_string();
        comment.date_last_updated = updated_at.to_string();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pinboard_types::{CommentKind, CommentWithReplies, Page, Pagination};

    use super::*;
    use crate::{
        error::ClientError,
        threads::tests::{comment, reply},
    };

    #[derive(Default)]
    struct State {
        comments: Vec<Comment>,
        next_id: CommentId,
        fail_next_update: bool,
        fail_lists: bool,
        hang_updates: bool,
        list_calls: usize,
    }

    #[derive(Default)]
    struct FakeBackend {
        state: Mutex<State>,
    }

    impl FakeBackend {
        fn with(comments: Vec<Comment>) -> Self {
            let next_id = comments.iter().map(|c| c.id).max().unwrap_or(0) + 1;
            Self {
                state: Mutex::new(State {
                    comments,
                    next_id,
                    ..State::default()
                }),
            }
        }

        fn state(&self) -> std::sync::MutexGuard<'_, State> {
            self.state.lock().unwrap()
        }
    }

    #[async_trait]
    impl CommentsBackend for FakeBackend {
        async fn list_comments(&self, page: u32, page_size: u32) -> Result<CommentPage> {
            let mut state = self.state();
            state.list_calls += 1;
            if state.fail_lists {
                return Err(ClientError::Server {
                    status: 503,
                    message: "unavailable".into(),
                });
            }

            let data: Vec<_> = state
                .comments
                .iter()
                .filter(|c| !c.is_reply())
                .map(|c| CommentWithReplies {
                    comment: c.clone(),
                    replies: state
                        .comments
                        .iter()
                        .filter(|r| r.parent_id == Some(c.id))
                        .cloned()
                        .collect(),
                })
                .collect();
            let total = data.len() as u64;
            Ok(Page {
                data,
                pagination: Pagination::new(page, page_size, total),
            })
        }

        async fn create_comment(&self, request: &CreateCommentRequest) -> Result<Comment> {
            let mut state = self.state();
            let id = state.next_id;
            state.next_id += 1;
            let created = Comment {
                text_content: request.text_content.clone(),
                kind: request.kind.unwrap_or_default(),
                parent_id: request.parent_id,
                ..comment(id, 1, request.x_coord, request.y_coord)
            };
            state.comments.push(created.clone());
            Ok(created)
        }

        async fn update_comment(
            &self,
            id: CommentId,
            request: &UpdateCommentRequest,
        ) -> Result<Comment> {
            let hang = self.state().hang_updates;
            if hang {
                std::future::pending::<()>().await;
            }

            let mut state = self.state();
            if std::mem::take(&mut state.fail_next_update) {
                return Err(ClientError::Forbidden(
                    "You can only update your own comments".into(),
                ));
            }
            let target = state
                .comments
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| ClientError::NotFound("Comment not found".into()))?;
            target.text_content = request.text_content.clone();
            Ok(target.clone())
        }

        async fn delete_comment(&self, id: CommentId) -> Result<()> {
            let mut state = self.state();
            state
                .comments
                .retain(|c| c.id != id && c.parent_id != Some(id));
            Ok(())
        }
    }

    async fn loaded_store(comments: Vec<Comment>) -> CommentStore<FakeBackend> {
        let mut store = CommentStore::new(FakeBackend::with(comments));
        store.load(PageKey::default()).await.unwrap();
        store
    }

    fn texts(store: &CommentStore<FakeBackend>) -> Vec<String> {
        store
            .threads()
            .top_level()
            .iter()
            .map(|c| c.text_content.clone())
            .collect()
    }

    #[tokio::test]
    async fn load_populates_threads() {
        let store = loaded_store(vec![comment(1, 1, 0.0, 0.0), reply(2, 1, 2)]).await;

        assert!(!store.is_stale());
        let threads = store.threads();
        assert_eq!(threads.top_level().len(), 1);
        assert_eq!(threads.replies_for(1)[0].id, 2);
        assert_eq!(store.page().unwrap().pagination.page_size, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn failed_update_reverts_to_previous_text() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0)]).await;
        let before = store.page().cloned();
        {
            let mut state = store.backend().state();
            state.fail_next_update = true;
            // Keep the refetch from masking the revert
            state.fail_lists = true;
        }

        let err = store.update(1, "rewritten".into()).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));
        assert_eq!(store.page().cloned(), before);
        assert_eq!(texts(&store), vec!["comment 1".to_string()]);
    }

    #[tokio::test]
    async fn successful_update_patches_and_refetches() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0)]).await;
        let calls_before = store.backend().state().list_calls;

        let updated = store.update(1, "rewritten".into()).await.unwrap();
        assert_eq!(updated.text_content, "rewritten");
        assert_eq!(texts(&store), vec!["rewritten".to_string()]);
        assert_eq!(store.backend().state().list_calls, calls_before + 1);
        assert!(!store.is_stale());
    }

    #[tokio::test]
    async fn optimistic_edit_survives_failed_refetch() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0), reply(2, 1, 1)]).await;
        store.backend().state().fail_lists = true;

        store.update(2, "edited reply".into()).await.unwrap();
        let threads = store.threads();
        let edited = &threads.replies_for(1)[0];
        assert_eq!(edited.text_content, "edited reply");
        assert_ne!(edited.date_last_updated, "2024-01-01T00:00:00.000000Z");
        // Still marked stale so the next load replaces it
        assert!(store.is_stale());
    }

    #[tokio::test]
    async fn create_and_delete_refresh_the_page() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0)]).await;

        let created = store
            .create(CreateCommentRequest {
                text_content: "new".into(),
                x_coord: 100.0,
                y_coord: 200.0,
                kind: None,
                parent_id: None,
            })
            .await
            .unwrap();
        assert_eq!(created.kind, CommentKind::Comment);
        assert_eq!(store.threads().top_level().len(), 2);

        store
            .create(CreateCommentRequest {
                text_content: "a reply".into(),
                x_coord: 0.0,
                y_coord: 0.0,
                kind: Some(CommentKind::Reply),
                parent_id: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(store.threads().replies_for(1).len(), 1);

        store.delete(1).await.unwrap();
        let threads = store.threads();
        assert_eq!(threads.top_level().len(), 1);
        assert_eq!(threads.top_level()[0].id, created.id);
        assert!(threads.replies_for(1).is_empty());
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_page() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0)]).await;
        store.backend().state().fail_lists = true;

        assert!(store.refresh().await.is_err());
        assert_eq!(store.threads().top_level().len(), 1);
    }

    #[tokio::test]
    async fn dropped_update_reverts_and_marks_stale() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0)]).await;
        let before = store.page().cloned();
        store.backend().state().hang_updates = true;

        let attempt = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            store.update(1, "never sent".into()),
        )
        .await;
        assert!(attempt.is_err());

        assert_eq!(store.page().cloned(), before);
        assert!(store.is_stale());
    }

    #[tokio::test]
    async fn split_edit_is_visible_while_in_flight() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0)]).await;

        let pending = store.begin_update(1, "draft".into());
        assert_eq!(texts(&store), vec!["draft".to_string()]);
        assert!(store.is_stale());

        store.backend().state().fail_next_update = true;
        let result = store
            .backend()
            .update_comment(pending.id(), pending.request())
            .await;
        assert!(store.finish_update(pending, result).await.is_err());
        assert_eq!(texts(&store), vec!["comment 1".to_string()]);
        assert!(!store.is_stale());
    }

    #[tokio::test]
    async fn abandoned_edit_reverts() {
        let mut store = loaded_store(vec![comment(1, 1, 0.0, 0.0)]).await;

        let pending = store.begin_update(1, "draft".into());
        store.abandon_update(pending);
        assert_eq!(texts(&store), vec!["comment 1".to_string()]);
        assert!(store.is_stale());
    }
}
