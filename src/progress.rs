//! Out-of-band task progress
//!
//! A second channel, keyed by session identifier, reports the server's task
//! list while an exchange streams. [`ProgressMerger`] keeps one standing
//! subscription per session and exposes the latest [`ProgressSnapshot`].

mod merger;
mod types;
mod websocket;

pub use merger::{ProgressGate, ProgressMerger};
pub use types::{ProgressSnapshot, TaskStatus};
pub use websocket::WebSocketFeed;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Snapshots in arrival order for one subscription
pub type ProgressStream = BoxStream<'static, Result<ProgressSnapshot, ProgressError>>;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Progress feed connection failed: {0}")]
    Connect(String),
    #[error("Progress feed transport error: {0}")]
    Transport(String),
}

/// Source of progress snapshots for a session
#[async_trait]
pub trait ProgressFeed: Send + Sync {
    async fn subscribe(&self, session_id: &str) -> Result<ProgressStream, ProgressError>;
}
