//! Client-side model for the pinboard canvas: viewport math, interaction
//! state, a cached view of the comment list, and the HTTP API client.

pub mod api;
pub mod cache;
pub mod controller;
pub mod error;
pub mod optimistic;
pub mod store;
pub mod threads;
pub mod viewport;

pub use api::{ApiClient, CommentsBackend};
pub use controller::CanvasController;
pub use error::{ClientError, Result};
pub use store::{CommentStore, PageKey};
pub use threads::Threads;
pub use viewport::{Point, Size, Viewport};
