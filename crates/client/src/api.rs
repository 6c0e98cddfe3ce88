use async_trait::async_trait;
use pinboard_types::{
    Comment, CommentId, CommentPage, CreateCommentRequest, DeleteResponse, ErrorBody,
    LoginRequest, LoginResponse, UpdateCommentRequest, User,
};
use reqwest::{header, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, Result};

/// The comment operations the cache layer needs from a server.
#[async_trait]
pub trait CommentsBackend: Send + Sync {
    async fn list_comments(&self, page: u32, page_size: u32) -> Result<CommentPage>;
    async fn create_comment(&self, request: &CreateCommentRequest) -> Result<Comment>;
    async fn update_comment(&self, id: CommentId, request: &UpdateCommentRequest)
        -> Result<Comment>;
    async fn delete_comment(&self, id: CommentId) -> Result<()>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server origin, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_ref().ok_or(ClientError::NotLoggedIn)?;
        Ok(request.bearer_auth(token))
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<User> {
        let request = self.http.post(self.url("/auth/login")).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        });
        let response: LoginResponse = fetch(request).await?;

        tracing::info!(user_id = response.user.id, "logged in");
        self.token = Some(response.access_token);
        Ok(response.user)
    }

    pub async fn logout(&mut self) -> Result<()> {
        check(self.http.post(self.url("/auth/logout")).send().await?).await?;
        self.token = None;
        Ok(())
    }

    pub async fn me(&self) -> Result<User> {
        fetch(self.authorized(self.http.get(self.url("/auth/me")))?).await
    }
}

#[async_trait]
impl CommentsBackend for ApiClient {
    async fn list_comments(&self, page: u32, page_size: u32) -> Result<CommentPage> {
        let request = self
            .http
            .get(self.url("/comments"))
            .query(&[("page", page), ("page_size", page_size)]);
        fetch(self.authorized(request)?).await
    }

    async fn create_comment(&self, request: &CreateCommentRequest) -> Result<Comment> {
        let request = self.http.post(self.url("/comments")).json(request);
        fetch(self.authorized(request)?).await
    }

    async fn update_comment(
        &self,
        id: CommentId,
        request: &UpdateCommentRequest,
    ) -> Result<Comment> {
        let request = self
            .http
            .patch(self.url(&format!("/comments/{id}")))
            .json(request);
        fetch(self.authorized(request)?).await
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let request = self.http.delete(self.url(&format!("/comments/{id}")));
        let _: DeleteResponse = fetch(self.authorized(request)?).await?;
        Ok(())
    }
}

async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = check(request.send().await?).await?;
    Ok(response.json().await?)
}

// Turns any non-2xx response into the matching error, keeping the server's message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    // The status alone still classifies the failure
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(%status, error = %err, "could not read error body");
            String::new()
        }
    };
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);

    Err(ClientError::from_status(status, message, retry_after))
}
