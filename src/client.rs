//! Assistant service client abstraction
//!
//! The coordinator talks to the service only through [`ChatBackend`], so
//! tests can drive the whole pipeline with scripted byte streams.

mod error;
mod http;
mod types;

pub use error::{ExchangeError, ExchangeErrorKind};
pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for the assistant service
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open a streaming exchange and return the raw response body
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ExchangeError>;

    /// Single request/response exchange
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ExchangeError>;

    /// Upload a file to the workspace
    async fn upload(&self, file: FileUpload) -> Result<UploadReceipt, ExchangeError>;

    /// Fetch the text preview of an uploaded file
    async fn preview(&self, name: &str) -> Result<String, ExchangeError>;

    /// Reachability probe
    async fn check_health(&self) -> bool;

    /// Prepare a named workspace on the service side
    async fn init_workspace(&self, workspace_id: &str) -> Result<(), ExchangeError>;
}

/// Logging wrapper for chat backends
pub struct LoggingBackend<B> {
    inner: B,
}

impl<B: ChatBackend> LoggingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<B: ChatBackend> ChatBackend for LoggingBackend<B> {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ExchangeError> {
        let start = std::time::Instant::now();
        let result = self.inner.open_stream(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    has_session = request.session_id.is_some(),
                    "Stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Stream request failed"
                );
            }
        }

        result
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ExchangeError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    session_id = ?response.session_id,
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Chat request failed"
                );
            }
        }

        result
    }

    async fn upload(&self, file: FileUpload) -> Result<UploadReceipt, ExchangeError> {
        let name = file.name.clone();
        let size = file.bytes.len();
        let result = self.inner.upload(file).await;
        match &result {
            Ok(receipt) => tracing::info!(file = %name, size, path = %receipt.saved_path, "File uploaded"),
            Err(e) => tracing::error!(file = %name, error = %e.message, "File upload failed"),
        }
        result
    }

    async fn preview(&self, name: &str) -> Result<String, ExchangeError> {
        self.inner.preview(name).await
    }

    async fn check_health(&self) -> bool {
        let reachable = self.inner.check_health().await;
        tracing::info!(reachable, "Connectivity probe finished");
        reachable
    }

    async fn init_workspace(&self, workspace_id: &str) -> Result<(), ExchangeError> {
        self.inner.init_workspace(workspace_id).await
    }
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ExchangeError> {
        (**self).open_stream(request).await
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ExchangeError> {
        (**self).complete(request).await
    }

    async fn upload(&self, file: FileUpload) -> Result<UploadReceipt, ExchangeError> {
        (**self).upload(file).await
    }

    async fn preview(&self, name: &str) -> Result<String, ExchangeError> {
        (**self).preview(name).await
    }

    async fn check_health(&self) -> bool {
        (**self).check_health().await
    }

    async fn init_workspace(&self, workspace_id: &str) -> Result<(), ExchangeError> {
        (**self).init_workspace(workspace_id).await
    }
}
