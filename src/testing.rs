//! Mock implementations for testing
//!
//! These mocks drive the exchange pipeline and the progress merger without
//! real I/O.

use crate::client::{
    ByteStream, ChatBackend, ChatRequest, ChatResponse, ExchangeError, FileUpload, UploadReceipt,
};
use crate::progress::{ProgressError, ProgressFeed, ProgressSnapshot, ProgressStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};

// ============================================================================
// Mock Chat Backend
// ============================================================================

/// Sender side of a test-driven response body
pub type StreamFeeder = mpsc::UnboundedSender<Result<Bytes, ExchangeError>>;

enum ScriptedStream {
    /// Body delivered in these pieces, then closed
    Pieces(Vec<Result<Bytes, ExchangeError>>),
    /// Body pushed by the test; closes when the feeder is dropped
    Channel(mpsc::UnboundedReceiver<Result<Bytes, ExchangeError>>),
    /// Request fails before any byte arrives
    Fail(ExchangeError),
    /// The service never answers
    Pending,
}

enum ScriptedResponse {
    Ready(Result<ChatResponse, ExchangeError>),
    Pending,
}

/// Backend that replays queued streams and responses
pub struct MockBackend {
    streams: Mutex<VecDeque<ScriptedStream>>,
    responses: Mutex<VecDeque<ScriptedResponse>>,
    previews: Mutex<HashMap<String, String>>,
    upload_error: Mutex<Option<String>>,
    healthy: Mutex<bool>,
    /// Record of every exchange request, streaming or not
    pub requests: Mutex<Vec<ChatRequest>>,
    pub uploads: Mutex<Vec<FileUpload>>,
    pub previewed: Mutex<Vec<String>>,
    pub workspaces: Mutex<Vec<String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(VecDeque::new()),
            responses: Mutex::new(VecDeque::new()),
            previews: Mutex::new(HashMap::new()),
            upload_error: Mutex::new(None),
            healthy: Mutex::new(true),
            requests: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            previewed: Mutex::new(Vec::new()),
            workspaces: Mutex::new(Vec::new()),
        }
    }

    /// Queue a body delivered as the given pieces
    pub fn queue_stream<I, S>(&self, pieces: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let pieces = pieces
            .into_iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_ref())))
            .collect();
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Pieces(pieces));
    }

    /// Queue a body that fails mid-transfer after the given pieces
    pub fn queue_broken_stream(&self, pieces: &[&str], error: ExchangeError) {
        let mut items: Vec<_> = pieces
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        items.push(Err(error));
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Pieces(items));
    }

    /// Queue a body the test feeds by hand
    pub fn queue_channel(&self) -> StreamFeeder {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Channel(rx));
        tx
    }

    pub fn queue_stream_error(&self, error: ExchangeError) {
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Fail(error));
    }

    /// Queue a streaming request that never gets an answer
    pub fn queue_silence(&self) {
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Pending);
    }

    pub fn queue_response(&self, response: Result<ChatResponse, ExchangeError>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Ready(response));
    }

    pub fn queue_silent_response(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Pending);
    }

    pub fn set_preview(&self, name: &str, text: &str) {
        self.previews
            .lock()
            .unwrap()
            .insert(name.to_string(), text.to_string());
    }

    pub fn fail_uploads(&self, message: &str) {
        *self.upload_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().unwrap() = healthy;
    }

    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.name.clone())
            .collect()
    }

    pub fn preview_requests(&self) -> usize {
        self.previewed.lock().unwrap().len()
    }

    pub fn initialized_workspaces(&self) -> Vec<String> {
        self.workspaces.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ExchangeError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.streams.lock().unwrap().pop_front();
        match script {
            Some(ScriptedStream::Pieces(items)) => Ok(futures::stream::iter(items).boxed()),
            Some(ScriptedStream::Channel(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(ScriptedStream::Fail(error)) => Err(error),
            Some(ScriptedStream::Pending) => std::future::pending().await,
            None => Err(ExchangeError::transport("No mock stream queued")),
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ExchangeError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.responses.lock().unwrap().pop_front();
        match script {
            Some(ScriptedResponse::Ready(result)) => result,
            Some(ScriptedResponse::Pending) => std::future::pending().await,
            None => Err(ExchangeError::transport("No mock response queued")),
        }
    }

    async fn upload(&self, file: FileUpload) -> Result<UploadReceipt, ExchangeError> {
        if let Some(message) = self.upload_error.lock().unwrap().clone() {
            return Err(ExchangeError::http(message));
        }
        let saved_path = format!("/workspace/{}", file.name);
        self.uploads.lock().unwrap().push(file);
        Ok(UploadReceipt { saved_path })
    }

    async fn preview(&self, name: &str) -> Result<String, ExchangeError> {
        self.previewed.lock().unwrap().push(name.to_string());
        self.previews
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ExchangeError::http("HTTP error! status: 404 (Not Found)"))
    }

    async fn check_health(&self) -> bool {
        *self.healthy.lock().unwrap()
    }

    async fn init_workspace(&self, workspace_id: &str) -> Result<(), ExchangeError> {
        self.workspaces.lock().unwrap().push(workspace_id.to_string());
        Ok(())
    }
}

/// Encode one event as a stream record
pub fn record(payload: &serde_json::Value) -> String {
    format!("data: {payload}\n")
}

// ============================================================================
// Mock Progress Feed
// ============================================================================

/// Progress feed whose snapshots are pushed by the test
pub struct MockProgressFeed {
    tx: broadcast::Sender<ProgressSnapshot>,
    /// Session identifiers subscribed to, in order
    pub subscriptions: Mutex<Vec<String>>,
}

impl Default for MockProgressFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProgressFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Deliver a snapshot to every live subscription
    pub fn push(&self, snapshot: ProgressSnapshot) {
        let _ = self.tx.send(snapshot);
    }

    pub fn subscribed_sessions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Wait until `count` subscriptions have been opened
    pub async fn wait_for_subscriptions(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.subscriptions.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("progress subscription was never opened");
    }

    /// Wait until every live subscription has taken all pushed snapshots.
    ///
    /// The feed task handles a snapshot in the same poll that receives it,
    /// so once the channel is empty the merger has accepted or ignored it.
    pub async fn wait_until_delivered(&self) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !self.tx.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("progress snapshot was never delivered");
    }
}

#[async_trait]
impl ProgressFeed for MockProgressFeed {
    async fn subscribe(&self, session_id: &str) -> Result<ProgressStream, ProgressError> {
        let rx = self.tx.subscribe();
        self.subscriptions
            .lock()
            .unwrap()
            .push(session_id.to_string());
        Ok(BroadcastStream::new(rx)
            .filter_map(|item| futures::future::ready(item.ok().map(Ok)))
            .boxed())
    }
}

/// Snapshot with a single running task
pub fn running_task(id: &str, title: &str) -> ProgressSnapshot {
    ProgressSnapshot::parse(&format!(
        r#"{{"tasks":[{{"id":"{id}","title":"{title}","status":"running"}}],"current_step":1,"total_steps":2}}"#
    ))
    .expect("valid snapshot")
}
