//! Exchange coordinator: one request from send to terminal event

use super::cancel::{ActiveExchange, CancelHandle};
use super::history::{History, Message};
use super::session::{resolve_workspace, SessionContext};
use crate::attachment::{self, compose_message, Attachment, AttachmentError};
use crate::client::{ChatBackend, ChatRequest, ChatResponse, ExchangeError, ExchangeErrorKind};
use crate::progress::{ProgressMerger, ProgressSnapshot};
use crate::state_machine::{Effect, SettledOutcome, StreamAccumulator, StreamSnapshot, StreamState};
use crate::stream::{interpret, FrameDecoder};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const CANCELLED_NOTICE: &str = "Operation cancelled by user.";
const EMPTY_RESPONSE_NOTICE: &str = "Empty response from backend";

/// Why a send was refused before anything happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// No text and no attachment
    Empty,
    /// Another exchange is still in flight
    Busy,
}

/// How an exchange ended
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    Rejected(Rejected),
    /// Terminal success; `message` is `None` when the service sent no text
    Completed { message: Option<Message> },
    Failed(ExchangeError),
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
enum Delivery {
    Streaming,
    Single,
}

impl Delivery {
    fn failure_text(self, error: &ExchangeError) -> String {
        match self {
            Self::Streaming => format!("Communication error: {}", error.message),
            Self::Single => format!(
                "Sorry, an error occurred while processing your message: {}",
                error.message
            ),
        }
    }
}

/// Owns history, session context, the pending attachment and the stream
/// accumulator, and runs at most one exchange at a time.
pub struct ExchangeCoordinator {
    backend: Arc<dyn ChatBackend>,
    accumulator: StreamAccumulator,
    progress: ProgressMerger,
    session: SessionContext,
    history: History,
    pending_attachment: Option<Attachment>,
    cancel: CancelHandle,
    timeout: Duration,
    paste_threshold: usize,
}

impl ExchangeCoordinator {
    pub fn new(backend: Arc<dyn ChatBackend>, progress: ProgressMerger) -> Self {
        let cancel = CancelHandle::new(progress.gate());
        Self {
            backend,
            accumulator: StreamAccumulator::new(),
            progress,
            session: SessionContext::default(),
            history: History::new(),
            pending_attachment: None,
            cancel,
            timeout: DEFAULT_TIMEOUT,
            paste_threshold: attachment::DEFAULT_PASTE_THRESHOLD,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.session.set_workspace(workspace_id);
        self
    }

    pub fn with_paste_threshold(mut self, threshold: usize) -> Self {
        self.paste_threshold = threshold;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[allow(dead_code)] // Useful for tests
    pub fn stream_state(&self) -> &StreamState {
        self.accumulator.state()
    }

    pub fn subscribe_stream(&self) -> watch::Receiver<StreamSnapshot> {
        self.accumulator.subscribe()
    }

    pub fn progress_snapshot(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    #[allow(dead_code)] // Useful for tests
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[allow(dead_code)] // Useful for tests
    pub fn is_active(&self) -> bool {
        self.cancel.is_active()
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    #[allow(dead_code)] // Useful for tests
    pub fn pending_attachment(&self) -> Option<&Attachment> {
        self.pending_attachment.as_ref()
    }

    /// Stage an attachment for the next send, replacing any staged one
    pub fn attach(&mut self, attachment: Attachment) -> &Attachment {
        if let Some(previous) = self.pending_attachment.take() {
            tracing::debug!(file = %previous.name, "Replacing pending attachment");
        }
        self.pending_attachment.insert(attachment)
    }

    pub fn detach(&mut self) -> Option<Attachment> {
        self.pending_attachment.take()
    }

    pub async fn attach_path(&mut self, path: &Path) -> Result<&Attachment, AttachmentError> {
        let attachment = attachment::attach_path(&*self.backend, path).await?;
        Ok(self.attach(attachment))
    }

    /// Handle a paste into the input. When it pushes the input over the
    /// threshold the text is staged as a file and the replacement input is
    /// returned; otherwise `None` and the paste stays inline.
    pub async fn attach_paste(
        &mut self,
        current_input: &str,
        pasted: &str,
    ) -> Result<Option<String>, AttachmentError> {
        let conversion =
            attachment::attach_paste(&*self.backend, current_input, pasted, self.paste_threshold)
                .await?;
        Ok(conversion.map(|c| {
            self.attach(c.attachment);
            c.replacement_input
        }))
    }

    // ========================================================================
    // Connectivity & workspace
    // ========================================================================

    /// Probe the service and record the result. Informational only; sends
    /// are never refused because of it.
    pub async fn probe_connectivity(&mut self) -> bool {
        let connected = self.backend.check_health().await;
        self.session.set_connected(connected);
        if connected && !self.session.is_default_workspace() {
            let workspace_id = self.session.workspace_id();
            if let Err(e) = self.backend.init_workspace(workspace_id).await {
                tracing::warn!(workspace_id, error = %e, "Workspace initialization failed");
            }
        }
        connected
    }

    /// Switch workspace (id or `/workspace/<id>` path) and re-probe
    pub async fn set_workspace(&mut self, workspace: &str) -> bool {
        let workspace_id = resolve_workspace(Some(workspace));
        tracing::info!(workspace_id = %workspace_id, "Switching workspace");
        self.session.set_workspace(workspace_id);
        self.probe_connectivity().await
    }

    /// Start a new conversation
    pub fn clear_chat(&mut self) {
        self.cancel.cancel();
        tracing::info!(messages = self.history.len(), "Clearing conversation");
        self.history.clear();
        self.session.reset();
        self.accumulator.reset();
        self.pending_attachment = None;
        self.progress.set_session(None);
        self.progress.reset();
    }

    // ========================================================================
    // Exchanges
    // ========================================================================

    /// Streaming exchange
    pub async fn send(&mut self, text: &str, attachment: Option<Attachment>) -> ExchangeOutcome {
        let (active, content) = match self.begin(text, attachment) {
            Ok(started) => started,
            Err(reason) => return ExchangeOutcome::Rejected(reason),
        };

        let request = ChatRequest::new(content)
            .with_session(self.session.session_id().map(str::to_string))
            .with_workspace(Some(self.session.workspace_id().to_string()));
        tracing::info!(
            session_id = ?request.session_id,
            workspace_id = ?request.workspace_id,
            "Starting streaming exchange"
        );

        let result = self.drive_stream(&request, active.token()).await;
        self.finish(result, Delivery::Streaming)
    }

    /// Non-streaming exchange
    pub async fn ask(&mut self, text: &str, attachment: Option<Attachment>) -> ExchangeOutcome {
        let (active, content) = match self.begin(text, attachment) {
            Ok(started) => started,
            Err(reason) => return ExchangeOutcome::Rejected(reason),
        };

        let request =
            ChatRequest::new(content).with_session(self.session.session_id().map(str::to_string));
        tracing::info!(session_id = ?request.session_id, "Starting exchange");

        let backend = self.backend.clone();
        let token = active.token();
        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(ExchangeError::cancelled()),
            () = tokio::time::sleep(self.timeout) => Err(ExchangeError::timed_out(self.timeout)),
            result = backend.complete(&request) => result,
        };

        let result = result.map(|response| Some(self.record_response(&response)));
        self.finish(result, Delivery::Single)
    }

    /// Shared prologue: rejection checks, attachment hand-off, user message,
    /// fresh accumulation and progress state.
    fn begin(
        &mut self,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<(ActiveExchange, String), Rejected> {
        if text.trim().is_empty() && attachment.is_none() && self.pending_attachment.is_none() {
            tracing::debug!("Ignoring empty send");
            return Err(Rejected::Empty);
        }
        let Some(active) = self.cancel.begin() else {
            tracing::debug!("Ignoring send while an exchange is active");
            return Err(Rejected::Busy);
        };

        // Consumed here so it is cleared exactly once whatever happens next
        let pending = self.pending_attachment.take();
        let attachment = attachment.or(pending);
        let content = compose_message(text, attachment.as_ref());

        self.history.push(Message::user(content.clone()));
        self.accumulator.reset();
        self.progress.reset();
        Ok((active, content))
    }

    async fn drive_stream(
        &mut self,
        request: &ChatRequest,
        token: &CancellationToken,
    ) -> Result<Option<Message>, ExchangeError> {
        let backend = self.backend.clone();
        // Runs until the first event arrives, headers included
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut body = tokio::select! {
            biased;
            () = token.cancelled() => return Err(ExchangeError::cancelled()),
            () = &mut deadline => return Err(ExchangeError::timed_out(self.timeout)),
            result = backend.open_stream(request) => result?,
        };

        let mut decoder = FrameDecoder::new();
        let mut completed = None;
        let mut awaiting_first_event = true;

        loop {
            let item = tokio::select! {
                biased;
                () = token.cancelled() => return self.interrupted(completed, ExchangeError::cancelled()),
                () = &mut deadline, if awaiting_first_event => {
                    return Err(ExchangeError::timed_out(self.timeout));
                }
                item = body.next() => item,
            };

            let chunk = match item {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return self.interrupted(completed, e),
                None => break,
            };

            for record in decoder.push(&chunk) {
                if token.is_cancelled() {
                    return self.interrupted(completed, ExchangeError::cancelled());
                }

                let event = match interpret(&record) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(e) if e.is_fatal() => return self.interrupted(completed, e),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed record");
                        continue;
                    }
                };
                tracing::debug!(event = event.kind(), "Stream event");
                awaiting_first_event = false;
                let closes_stream = event.closes_stream();

                for effect in self.accumulator.apply(event) {
                    match effect {
                        Effect::CompleteMessage { content } => {
                            completed = Some(self.history.push(Message::assistant(content)).clone());
                        }
                        Effect::FailMessage { message } => {
                            return Err(ExchangeError::server(message));
                        }
                        Effect::RecordSession { session_id } => self.adopt_session(&session_id),
                    }
                }

                if closes_stream {
                    return Ok(completed);
                }
            }
        }

        decoder.finish();
        self.interrupted(completed, ExchangeError::premature_termination())
    }

    /// The stream stopped early. Once a final response has been delivered the
    /// exchange already succeeded and only the trailing session handover is
    /// lost; otherwise this is a failure.
    fn interrupted(
        &self,
        completed: Option<Message>,
        error: ExchangeError,
    ) -> Result<Option<Message>, ExchangeError> {
        match self.accumulator.state() {
            StreamState::Settled {
                outcome: SettledOutcome::Completed,
            } => Ok(completed),
            _ => Err(error),
        }
    }

    fn record_response(&mut self, response: &ChatResponse) -> Message {
        if self.session.adopt_if_absent(response.session_id.as_deref()) {
            tracing::info!(session_id = ?self.session.session_id(), "Session established");
            self.progress.set_session(self.session.session_id());
        }

        let timestamp = response
            .timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map_or_else(Utc::now, |t| t.with_timezone(&Utc));
        let content = response.text().unwrap_or(EMPTY_RESPONSE_NOTICE);
        self.history
            .push(Message::assistant(content).at(timestamp))
            .clone()
    }

    fn adopt_session(&mut self, session_id: &str) {
        if self.session.adopt(Some(session_id)) {
            tracing::info!(session_id, "Session established");
            self.progress.set_session(self.session.session_id());
        }
    }

    /// Single exit path: every outcome other than success appends exactly
    /// one error-flagged message.
    fn finish(
        &mut self,
        result: Result<Option<Message>, ExchangeError>,
        delivery: Delivery,
    ) -> ExchangeOutcome {
        let error = match result {
            Ok(message) => {
                tracing::info!(has_message = message.is_some(), "Exchange completed");
                return ExchangeOutcome::Completed { message };
            }
            Err(error) => error,
        };

        if !self.accumulator.state().is_settled() {
            let discarded = self.accumulator.abandon();
            tracing::debug!(bytes = discarded, "Discarded live buffer");
        }

        if error.kind.is_abort() {
            // Late progress for an aborted exchange must never show
            self.progress.suspend();
            return if error.kind == ExchangeErrorKind::TimedOut {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "Exchange timed out");
                self.history.push(Message::error(format!(
                    "Request timed out after {} seconds.",
                    self.timeout.as_secs()
                )));
                ExchangeOutcome::TimedOut
            } else {
                self.history.push(Message::error(CANCELLED_NOTICE));
                ExchangeOutcome::Cancelled
            };
        }

        tracing::error!(error = %error.message, kind = ?error.kind, "Exchange failed");
        self.history.push(Message::error(delivery.failure_text(&error)));
        ExchangeOutcome::Failed(error)
    }
}
