//! Events that drive the stream accumulator

/// Typed event decoded from one stream record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Task progress notice; the task list itself arrives on the progress feed
    Progress,
    /// Delta to append to the live text
    Chunk { text: String },
    /// Running snapshot (`partial`) or authoritative final text
    Response { text: String, partial: bool },
    /// End of stream, optionally carrying the session identifier
    End { session_id: Option<String> },
    /// Service-side failure
    Error { message: String },
}

impl StreamEvent {
    /// Whether nothing useful can follow this event on the wire. A final
    /// `response` may still be trailed by an `end` carrying the session.
    pub fn closes_stream(&self) -> bool {
        matches!(self, StreamEvent::End { .. } | StreamEvent::Error { .. })
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Progress => "progress",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Response { partial: true, .. } => "response_partial",
            StreamEvent::Response { partial: false, .. } => "response",
            StreamEvent::End { .. } => "end",
            StreamEvent::Error { .. } => "error",
        }
    }
}
