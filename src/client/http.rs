//! HTTP implementation of the assistant service client

use super::{ByteStream, ChatBackend, ChatRequest, ChatResponse, ExchangeError, FileUpload, UploadReceipt};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{multipart, Client, Url};
use std::time::Duration;

const STREAM_PATH: &[&str] = &["service", "chat", "stream"];
const CHAT_PATH: &[&str] = &["service", "chat"];
const HEALTH_PATH: &[&str] = &["service", "health"];
const UPLOAD_PATH: &[&str] = &["service", "api", "workspace", "files", "upload"];
const FILES_PATH: &[&str] = &["service", "api", "workspace", "files"];
const WORKSPACE_PATH: &[&str] = &["service", "workspace"];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Assistant service reached over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Build a client for the service rooted at `base_url`.
    ///
    /// No overall request timeout is set: streams may legitimately run for
    /// minutes, and the coordinator owns the response timeout.
    pub fn new(base_url: &str) -> Result<Self, ExchangeError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ExchangeError::transport(format!("Invalid base URL {base_url}: {e}")))?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ExchangeError::transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Join path segments onto the base URL, percent-encoding each one
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ExchangeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ExchangeError::transport(format!("Base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ExchangeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ExchangeError::from_status(status, &body))
    }

    async fn probe(&self, url: Url) -> bool {
        match self.client.get(url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Connectivity probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ExchangeError> {
        let url = self.endpoint(STREAM_PATH)?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(&e))?;
        let response = Self::ensure_success(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ExchangeError::from_reqwest(&e)));
        Ok(body.boxed())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ExchangeError> {
        let url = self.endpoint(CHAT_PATH)?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(&e))?;
        let response = Self::ensure_success(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::transport(format!("Failed to read response: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| ExchangeError::transport(format!("Failed to parse response: {e} - body: {body}")))
    }

    async fn upload(&self, file: FileUpload) -> Result<UploadReceipt, ExchangeError> {
        let url = self.endpoint(UPLOAD_PATH)?;
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.mime_type)
            .map_err(|e| ExchangeError::transport(format!("Invalid MIME type {}: {e}", file.mime_type)))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(&e))?;
        let response = Self::ensure_success(response)
            .await
            .map_err(|e| ExchangeError::new(e.kind, format!("Upload failed: {}", e.message)))?;
        response
            .json::<UploadReceipt>()
            .await
            .map_err(|e| ExchangeError::transport(format!("Failed to parse upload response: {e}")))
    }

    async fn preview(&self, name: &str) -> Result<String, ExchangeError> {
        let mut segments = FILES_PATH.to_vec();
        segments.extend([name, "preview"]);
        let url = self.endpoint(&segments)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(&e))?;
        let response = Self::ensure_success(response).await?;
        response
            .text()
            .await
            .map_err(|e| ExchangeError::transport(format!("Failed to read preview: {e}")))
    }

    async fn check_health(&self) -> bool {
        let Ok(health) = self.endpoint(HEALTH_PATH) else {
            return false;
        };
        if self.probe(health).await {
            return true;
        }
        tracing::warn!("Health endpoint unreachable, trying service root");
        let Ok(root) = self.endpoint(&[""]) else {
            return false;
        };
        self.probe(root).await
    }

    async fn init_workspace(&self, workspace_id: &str) -> Result<(), ExchangeError> {
        let mut segments = WORKSPACE_PATH.to_vec();
        segments.push(workspace_id);
        let url = self.endpoint(&segments)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ExchangeError::from_reqwest(&e))?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}
